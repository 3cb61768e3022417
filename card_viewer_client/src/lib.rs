//! `card_viewer_client` 卡片查看客户端核心库。
//!
//! 本 Crate 连接本机的卡片控制服务端，维护卡片列表、图片上传、卡片详情、
//! 串口监视与刷卡结果显示等视图状态，并以 [`event::ViewEvent`] 的形式发布给展示层。
//!
//! 主要模块包括：
//! - `config`: 配置的加载与默认值。
//! - `error`: 应用错误类型。
//! - `event`: 发布给展示层的视图事件。
//! - `state`: 派生视图状态。
//! - `upload`: 图片上传表单与校验。
//! - `ws_client`: 两条 WebSocket 通道及其事件循环。

pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod upload;
pub mod ws_client;
