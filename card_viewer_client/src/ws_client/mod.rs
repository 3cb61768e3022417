// card_viewer_client/src/ws_client/mod.rs

//! 卡片查看客户端的 WebSocket 核心逻辑模块。
//!
//! 客户端与控制服务端之间有两条相互独立的通道，连接同一个地址，仅靠应用层协议区分：
//! - **主通道**: 卡片列表、卡片详情、图片上传，以及按 UID 查询刷卡结果；
//! - **监视通道**: 开启串口监视后持续接收设备日志。
//!
//! # 核心组件
//! - `connection`: 单个通道的状态机与套接字任务。
//! - `reconnect`: 固定延迟的重连策略。
//! - `router`: 入站消息的分类与分发。
//! - `serial_passthrough`: 从串口日志中识别刷卡帧。
//! - `card_scan_notifier`: 刷卡结果的限时显示。
//! - `service`: 把上述组件组合到单个事件循环中的客户端服务。

pub mod card_scan_notifier;
pub mod connection;
pub mod reconnect;
pub mod router;
pub mod serial_passthrough;
pub mod service;

pub use service::{CardViewerClient, ClientCommand, ClientHandle};
