// card_viewer_client/src/config.rs

//! 卡片查看客户端配置模块。
//!
//! 定义客户端运行所需的配置参数 (`AppConfig`)，并提供从 JSON 文件加载配置的功能。
//! 配置文件是只读的：文件不存在时使用默认配置，客户端不会写回任何文件。

use log::{info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::AppError;

/// 默认的配置文件名，位于当前工作目录。
pub const DEFAULT_CONFIG_FILE: &str = "card_viewer_settings.json";

/// 客户端配置。
///
/// 所有字段都有默认值，配置文件中只需写出需要覆盖的字段。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// 控制服务端所在主机。
    pub server_host: String,
    /// WebSocket 端口，主通道与监视通道共用。
    pub ws_port: u16,
    /// 提供卡片图片的 HTTP 端口。
    pub media_port: u16,
    /// 通道意外关闭后的固定重连延迟 (毫秒)。
    pub reconnect_delay_ms: u64,
    /// 主通道未打开时被丢弃的请求的重试延迟 (毫秒)。
    pub request_retry_delay_ms: u64,
    /// 刷卡结果的显示时长 (毫秒)。
    pub card_display_ms: u64,
    /// 启动后是否自动开启串口监视。
    pub auto_start_monitor: bool,
    /// 串口日志视图最多保留的行数。
    pub serial_log_capacity: usize,
    /// 日志级别: `trace` / `debug` / `info` / `warn` / `error`。
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "localhost".to_string(),
            ws_port: 8765,
            media_port: 8080,
            reconnect_delay_ms: 3000,
            request_retry_delay_ms: 1000,
            card_display_ms: 10_000,
            auto_start_monitor: true,
            serial_log_capacity: 500,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 两个通道共用的 WebSocket 地址，例如 `ws://localhost:8765`。
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.server_host, self.ws_port)
    }

    /// 卡片图片的 URL: `http://<host>:<media_port>/media/<filename>`。
    pub fn media_url(&self, filename: &str) -> String {
        format!("http://{}:{}/media/{}", self.server_host, self.media_port, filename)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_retry_delay(&self) -> Duration {
        Duration::from_millis(self.request_retry_delay_ms)
    }

    pub fn card_display_duration(&self) -> Duration {
        Duration::from_millis(self.card_display_ms)
    }

    /// 解析日志级别，无法识别时退回 `Info`。
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    /// 校验配置取值是否可用。
    pub fn validate(&self) -> Result<(), AppError> {
        Url::parse(&self.ws_url())
            .map_err(|e| AppError::ConfigError(format!("WebSocket 地址 '{}' 无效: {}", self.ws_url(), e)))?;
        if self.reconnect_delay_ms == 0 {
            return Err(AppError::ConfigError("reconnect_delay_ms 必须大于 0".to_string()));
        }
        if self.serial_log_capacity == 0 {
            return Err(AppError::ConfigError("serial_log_capacity 必须大于 0".to_string()));
        }
        Ok(())
    }
}

/// 从指定路径加载配置。
///
/// - 文件不存在：返回默认配置；
/// - 文件存在但无法读取或不是合法 JSON：返回 `AppError::ConfigError`；
/// - 解析成功后还会调用 [`AppConfig::validate`]。
pub fn load_app_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        info!("[配置模块] 未找到配置文件 {:?}，使用默认配置。", path);
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| AppError::ConfigError(format!("读取配置文件 {:?} 失败: {}", path, e)))?;
    let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
        warn!("[配置模块] 解析配置文件 {:?} 失败: {}", path, e);
        AppError::ConfigError(format!("解析配置文件 {:?} 失败: {}", path, e))
    })?;
    config.validate()?;
    info!("[配置模块] 已成功从配置文件 {:?} 加载配置。", path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // 测试结束时删除临时配置文件，即使测试中途 panic 也会执行。
    struct TestCleanup {
        file_to_delete: PathBuf,
    }

    impl Drop for TestCleanup {
        fn drop(&mut self) {
            if self.file_to_delete.exists() {
                if let Err(e) = fs::remove_file(&self.file_to_delete) {
                    eprintln!("警告：测试后清理配置文件 '{}' 失败: {}", self.file_to_delete.display(), e);
                }
            }
        }
    }

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("card_viewer_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_default_urls() {
        let config = AppConfig::default();
        assert_eq!(config.ws_url(), "ws://localhost:8765");
        assert_eq!(config.media_url("key_01.jpg"), "http://localhost:8080/media/key_01.jpg");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.request_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.card_display_duration(), Duration::from_secs(10));
        assert_eq!(config.level_filter(), LevelFilter::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = temp_config_path("missing");
        let _cleanup = TestCleanup { file_to_delete: path.clone() };
        let config = load_app_config(&path).expect("缺失的配置文件应退回默认配置");
        assert_eq!(config, AppConfig::default());
        // 加载过程不应创建文件
        assert!(!path.exists());
    }

    #[test]
    /// 部分字段的配置文件：未写出的字段取默认值。
    fn test_partial_file_fills_defaults() {
        let path = temp_config_path("partial");
        let _cleanup = TestCleanup { file_to_delete: path.clone() };
        fs::write(&path, r#"{"server_host": "192.168.1.20", "reconnect_delay_ms": 500, "log_level": "debug"}"#)
            .expect("写入测试配置失败");

        let config = load_app_config(&path).expect("加载部分配置失败");
        assert_eq!(config.ws_url(), "ws://192.168.1.20:8765");
        assert_eq!(config.reconnect_delay(), Duration::from_millis(500));
        assert_eq!(config.card_display_ms, 10_000);
        assert_eq!(config.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let path = temp_config_path("corrupted");
        let _cleanup = TestCleanup { file_to_delete: path.clone() };
        fs::write(&path, "这不是一个有效的JSON字符串").expect("写入测试配置失败");

        match load_app_config(&path) {
            Err(AppError::ConfigError(msg)) => assert!(msg.contains("解析配置文件"), "错误信息未指出解析失败: {}", msg),
            other => panic!("预期 ConfigError，实际: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = AppConfig { reconnect_delay_ms: 0, ..AppConfig::default() };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

        let config = AppConfig { serial_log_capacity: 0, ..AppConfig::default() };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));

        let config = AppConfig { server_host: "bad host".to_string(), ..AppConfig::default() };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let config = AppConfig { log_level: "verbose".to_string(), ..AppConfig::default() };
        assert_eq!(config.level_filter(), LevelFilter::Info);
    }
}
