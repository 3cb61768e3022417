//! `card_ws_utils` 是一个提供 WebSocket 客户端通信实用功能的 Rust Crate。
//! 它与 `card_models` 一起使用，负责把出站请求写成文本帧、把入站文本帧原样交付给上层。
//!
//! 主要模块包括：
//! - `error`: 定义库中使用的错误类型 `WsError`。
//! - `client`: 提供 WebSocket 客户端传输层。

pub mod client;
pub mod error;

pub use error::WsError;
