//! `card_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了卡片查看客户端各组件 (WebSocket 工具库、客户端服务) 之间共享的
//! 线上数据结构与枚举类型。
//!
//! 主要包含：
//! - **通用枚举 (`enums`)**: 通道角色、响应状态、串口日志方向。
//! - **WebSocket 负载 (`ws_payloads`)**: 出站请求、卡片记录、串口日志行、刷卡事件。
//! - **入站信封 (`envelope`)**: 原始信封与分类后的强类型信封。
//!
//! 所有线上模型都派生 `serde::Serialize` / `serde::Deserialize` (信封为手工解码)，
//! 以及 `Debug` 和 `Clone`。

pub mod enums;
pub mod envelope;
pub mod ws_payloads;

pub use enums::{ChannelRole, ResponseStatus, SerialDirection};
pub use envelope::{EnvelopeKind, InboundEnvelope, RawEnvelope};
pub use ws_payloads::{CardRecord, CardScanEvent, CardUid, OutboundRequest, SerialLogLine};
