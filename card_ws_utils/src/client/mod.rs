// card_ws_utils/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! 封装 `tokio-tungstenite` 的细节，为上层提供：
//! - **连接建立**: 连接到本地控制服务端；
//! - **文本帧收发**: 出站请求序列化为 JSON 文本帧发送，入站只交付原始文本，
//!   解析与分类由上层的消息路由器负责；
//! - **关闭**: 发送 Close 帧主动断开。

pub mod transport;
