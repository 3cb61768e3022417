// card_viewer_client/src/ws_client/router.rs

//! 消息路由器：把一帧入站文本分类为 [`InboundEnvelope`] 并调用恰好一个处理器。
//!
//! 分类按固定顺序进行，先命中者生效：
//!
//! 1. `command == "list_cards"` 且 `status == "success"` → 卡片列表
//! 2. `command == "upload_image"` (任意状态) → 上传结果
//! 3. `command == "get_card_details"` (任意状态) → 卡片详情
//! 4. `type == "card_scanned"` → 刷卡事件
//! 5. `status == "error"` → 服务端错误 (仅上报)
//! 6. `type == "serial_data"` → 串口日志
//!
//! 都不命中则静默忽略。非法 JSON 在这里被捕获并记日志，绝不会向上传播。

use card_models::ws_payloads::{
    CARD_SCANNED_TYPE, GET_CARD_DETAILS_COMMAND, LIST_CARDS_COMMAND, SERIAL_DATA_TYPE, UPLOAD_IMAGE_COMMAND,
};
use card_models::{
    CardRecord, CardScanEvent, ChannelRole, EnvelopeKind, InboundEnvelope, RawEnvelope, ResponseStatus,
    SerialLogLine,
};
use log::{debug, warn};
use serde_json::Value;

use crate::error::AppError;

/// 一次分发的结果，用于日志与测试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(EnvelopeKind),
    /// 无规则命中，或接收通道没有注册该种类的处理器。
    Ignored,
    /// 非法 JSON，或判别字段可识别但负载无法解码。
    Malformed,
}

/// 各类信封的处理器。由客户端服务实现。
pub trait EnvelopeHandler {
    fn on_card_list(&mut self, cards: Vec<CardRecord>);

    fn on_upload_result(&mut self, status: Option<ResponseStatus>, message: Option<String>);

    fn on_card_details(&mut self, status: Option<ResponseStatus>, card: Option<CardRecord>, message: Option<String>);

    fn on_card_scanned(&mut self, role: ChannelRole, scan: CardScanEvent);

    /// `status:"error"` 且没有更具体的规则命中。只允许上报，不应修改状态。
    fn on_server_error(&mut self, role: ChannelRole, command: Option<String>, message: Option<String>);

    fn on_serial_data(&mut self, line: SerialLogLine);
}

/// 某个通道是否处理某类信封。
///
/// 主通道: 卡片列表、上传结果、卡片详情、刷卡事件、服务端错误；
/// 监视通道: 串口日志、刷卡事件、服务端错误。
pub fn handles(role: ChannelRole, kind: EnvelopeKind) -> bool {
    match role {
        ChannelRole::Primary => matches!(
            kind,
            EnvelopeKind::CardList
                | EnvelopeKind::UploadResult
                | EnvelopeKind::CardDetails
                | EnvelopeKind::CardScanned
                | EnvelopeKind::ServerError
        ),
        ChannelRole::Monitor => matches!(
            kind,
            EnvelopeKind::SerialData | EnvelopeKind::CardScanned | EnvelopeKind::ServerError
        ),
    }
}

/// 按规则顺序分类。`Ok(None)` 表示没有规则命中。
pub fn classify_envelope(raw: &RawEnvelope) -> Result<Option<InboundEnvelope>, AppError> {
    let status = raw.response_status();

    if raw.command_is(LIST_CARDS_COMMAND) && status == Some(ResponseStatus::Success) {
        let cards = raw
            .field("cards")
            .ok_or_else(|| AppError::Protocol("list_cards 响应缺少 cards 字段".to_string()))?;
        let cards: Vec<CardRecord> = serde_json::from_value(cards)
            .map_err(|e| AppError::Protocol(format!("无法解码 cards 字段: {}", e)))?;
        return Ok(Some(InboundEnvelope::CardList { cards }));
    }

    if raw.command_is(UPLOAD_IMAGE_COMMAND) {
        return Ok(Some(InboundEnvelope::UploadResult { status, message: raw.message() }));
    }

    if raw.command_is(GET_CARD_DETAILS_COMMAND) {
        let card = match raw.field("card") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<CardRecord>(value)
                    .map_err(|e| AppError::Protocol(format!("无法解码 card 字段: {}", e)))?,
            ),
        };
        return Ok(Some(InboundEnvelope::CardDetails { status, card, message: raw.message() }));
    }

    if raw.kind_is(CARD_SCANNED_TYPE) {
        let scan: CardScanEvent = serde_json::from_value(raw.body_value())
            .map_err(|e| AppError::Protocol(format!("无法解码刷卡事件: {}", e)))?;
        return Ok(Some(InboundEnvelope::CardScanned(scan)));
    }

    if status == Some(ResponseStatus::Error) {
        return Ok(Some(InboundEnvelope::ServerError { command: raw.command.clone(), message: raw.message() }));
    }

    if raw.kind_is(SERIAL_DATA_TYPE) {
        let line: SerialLogLine = serde_json::from_value(raw.body_value())
            .map_err(|e| AppError::Protocol(format!("无法解码串口日志行: {}", e)))?;
        return Ok(Some(InboundEnvelope::SerialData(line)));
    }

    Ok(None)
}

/// 解析、分类并分发一帧文本。任何失败都只记日志。
pub fn dispatch_frame<H: EnvelopeHandler>(role: ChannelRole, text: &str, handler: &mut H) -> DispatchOutcome {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("[消息路由] {}通道收到非法 JSON，已丢弃: {} (内容: {:.120})", role, e, text);
            return DispatchOutcome::Malformed;
        }
    };

    let Some(raw) = RawEnvelope::from_value(value) else {
        debug!("[消息路由] {}通道收到非对象 JSON，忽略。", role);
        return DispatchOutcome::Ignored;
    };

    let envelope = match classify_envelope(&raw) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            debug!(
                "[消息路由] {}通道收到无法识别的消息 (command={:?}, type={:?})，忽略。",
                role, raw.command, raw.kind
            );
            return DispatchOutcome::Ignored;
        }
        Err(e) => {
            warn!("[消息路由] {}通道: {}", role, e);
            return DispatchOutcome::Malformed;
        }
    };

    let kind = envelope.kind();
    if !handles(role, kind) {
        debug!("[消息路由] {}通道未注册 {:?} 处理器，忽略。", role, kind);
        return DispatchOutcome::Ignored;
    }

    match envelope {
        InboundEnvelope::CardList { cards } => handler.on_card_list(cards),
        InboundEnvelope::UploadResult { status, message } => handler.on_upload_result(status, message),
        InboundEnvelope::CardDetails { status, card, message } => handler.on_card_details(status, card, message),
        InboundEnvelope::CardScanned(scan) => handler.on_card_scanned(role, scan),
        InboundEnvelope::ServerError { command, message } => handler.on_server_error(role, command, message),
        InboundEnvelope::SerialData(line) => handler.on_serial_data(line),
    }
    DispatchOutcome::Handled(kind)
}
