use anyhow::Context;
use card_viewer_client::config::{load_app_config, DEFAULT_CONFIG_FILE};
use card_viewer_client::ws_client::CardViewerClient;
use log::{error, info};
use std::path::Path;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 日志级别来自配置，因此先加载配置再初始化日志
    let config = load_app_config(Path::new(DEFAULT_CONFIG_FILE)).context("加载客户端配置失败")?;

    env_logger::Builder::new()
        .filter_level(config.level_filter())
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已初始化 (env_logger)，级别: {}", config.level_filter());
    info!("[主程序] 服务端: {}，媒体地址前缀: {}", config.ws_url(), config.media_url(""));

    let (handle, mut view_events, client_task) = CardViewerClient::spawn(config);

    // 视图事件以 JSON 行输出到标准输出，供外部展示层消费
    let printer = tokio::spawn(async move {
        while let Some(event) = view_events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("[主程序] 视图事件序列化失败: {}", e),
            }
        }
    });

    tokio::signal::ctrl_c().await.context("等待 Ctrl-C 信号失败")?;
    info!("[主程序] 收到 Ctrl-C，正在退出...");
    if let Err(e) = handle.shutdown() {
        error!("[主程序] 发送关闭命令失败: {}", e);
    }

    client_task.await.context("客户端事件循环异常结束")?;
    printer.await.context("视图事件输出任务异常结束")?;
    info!("[主程序] 已退出。");
    Ok(())
}
