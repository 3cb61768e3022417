// card_viewer_client/src/event.rs

//! 视图事件定义模块。
//!
//! 客户端不直接渲染任何界面，而是把每一次派生状态的变化作为 [`ViewEvent`] 发布出去，
//! 由展示层 (表格、图片、状态栏) 订阅处理。所有事件都可序列化为 JSON。

use card_models::{CardRecord, CardScanEvent, ChannelRole, SerialLogLine};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::ws_client::connection::ConnectionState;

/// 串口监视指示器的状态。
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    /// 未开启，或已被用户停止。
    Disconnected,
    Connected,
    /// 通道意外关闭，等待重连。
    Reconnecting,
}

/// 当前显示中的刷卡结果。
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct DisplayedScan {
    pub scan: CardScanEvent,
    /// 本地显示时间。
    pub shown_at: DateTime<Local>,
}

/// 发布给展示层的事件。
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ViewEvent {
    /// 某个通道的连接状态发生变化。
    ConnectionStatus { role: ChannelRole, state: ConnectionState },
    /// 卡片表格整体替换。空列表表示显示"数据库中没有卡片"的占位行。
    CardListUpdated { cards: Vec<CardRecord> },
    /// 上传请求已发出，等待服务端结果。
    UploadInProgress { filename: String },
    /// 服务端返回的上传结果。
    UploadStatus { success: bool, message: String },
    /// 上传成功后清空上传表单。
    UploadFormReset,
    /// 用户输入不完整或通道未连接，上传请求未发出。
    UploadRejected { reason: String },
    CardDetailsLoaded { card: CardRecord, image_url: Option<String> },
    CardDetailsFailed { message: String },
    CardScanDisplayed(DisplayedScan),
    /// 刷卡结果显示时间到期。
    CardScanCleared,
    SerialLineAppended(SerialLogLine),
    SerialLogCleared,
    MonitorStatusChanged { status: MonitorStatus },
    /// 服务端的 `status:"error"` 响应，显示在状态区域。
    ServerError {
        role: ChannelRole,
        command: Option<String>,
        message: String,
    },
}
