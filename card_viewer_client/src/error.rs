// card_viewer_client/src/error.rs

//! 卡片查看客户端的错误类型。
//!
//! 本层没有致命错误：传输错误靠重连恢复，协议错误记日志后丢弃，
//! 服务端的 `status:"error"` 作为视图事件上报，用户输入错误在发起网络请求前被拒绝。

use card_ws_utils::WsError;
use thiserror::Error;

/// 应用的主要错误类型。
#[derive(Error, Debug)]
pub enum AppError {
    /// 来自 WebSocket 传输层的错误 (包括通道未打开时请求被丢弃)。
    #[error("WebSocket 传输错误: {0}")]
    Transport(#[from] WsError),

    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 用户输入缺少必填字段，请求不会被发送。
    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),

    /// 入站消息的判别字段可识别，但负载无法解码。
    #[error("协议错误: {0}")]
    Protocol(String),

    /// 读取本地文件 (例如待上传的图片) 失败。
    #[error("文件读取错误: {0}")]
    Io(#[from] std::io::Error),

    /// 事件循环已经结束，命令无法送达。
    #[error("客户端已停止")]
    ClientStopped,
}
