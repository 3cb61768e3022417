// card_viewer_client/src/ws_client/serial_passthrough.rs

//! 从串口日志行中识别内嵌的刷卡帧。
//!
//! 串口流里混杂着任意设备日志，因此分两步匹配：先做子串预过滤，命中后再按 JSON 结构解析。
//! 匹配成功时生成 `get_card_details_by_uid` 请求，由调用方在主通道上发送。

use card_models::ws_payloads::CARD_DATA_FRAME_TYPE;
use card_models::{OutboundRequest, SerialDirection, SerialLogLine};
use log::debug;
use serde_json::Value;

/// 检查一行串口日志，若其中是刷卡帧则返回查询请求。
///
/// 不匹配 (方向不是输入、没有标记子串、JSON 无效、缺少字段) 时返回 `None`，
/// 这对普通串口流量是正常情况。
pub fn inspect(line: &SerialLogLine) -> Option<OutboundRequest> {
    if line.direction != SerialDirection::Incoming || !line.message.contains(CARD_DATA_FRAME_TYPE) {
        return None;
    }

    let frame: Value = match serde_json::from_str(line.message.trim()) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("[串口透传] 含 cardData 标记但不是有效 JSON，跳过: {}", e);
            return None;
        }
    };

    if frame.get("type").and_then(Value::as_str) != Some(CARD_DATA_FRAME_TYPE) {
        debug!("[串口透传] JSON 的 type 不是 cardData，跳过。");
        return None;
    }

    let uid = frame.get("cardUID").and_then(Value::as_str).filter(|uid| !uid.is_empty())?;
    debug!("[串口透传] 识别到刷卡帧，UID: {}", uid);
    Some(OutboundRequest::GetCardDetailsByUid { uid: uid.to_string() })
}
