//! 入站信封模型。
//!
//! 服务端发来的每一帧 JSON 都是一个"信封"，其种类由字段组合 (`command` + `status`，或 `type`)
//! 区分，而不是由单一的标签字段区分。本模块提供两层表示：
//!
//! - [`RawEnvelope`]：只提取判别字段，其余字段原样保留，供路由层按规则分类；
//! - [`InboundEnvelope`]：分类完成后的强类型变体。
//!
//! 分类规则 (先后顺序) 由客户端的消息路由器负责，不在此处实现。

use serde_json::{Map, Value};

use crate::enums::ResponseStatus;
use crate::ws_payloads::{CardRecord, CardScanEvent, SerialLogLine};

/// 只解析出判别字段的入站信封。
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    pub command: Option<String>,
    /// 原始 `status` 文本。未知取值也保留，分类时经 [`ResponseStatus::from_wire`] 解释。
    pub status: Option<String>,
    /// `type` 字段。
    pub kind: Option<String>,
    /// 完整的 JSON 对象，负载字段从这里解码。
    pub body: Map<String, Value>,
}

impl RawEnvelope {
    /// 从任意 JSON 值构造。非对象 (数组、字符串、数字等) 不是信封，返回 `None`。
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(body) = value else {
            return None;
        };
        let text_field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        Some(RawEnvelope {
            command: text_field("command"),
            status: text_field("status"),
            kind: text_field("type"),
            body,
        })
    }

    pub fn response_status(&self) -> Option<ResponseStatus> {
        self.status.as_deref().and_then(ResponseStatus::from_wire)
    }

    pub fn command_is(&self, command: &str) -> bool {
        self.command.as_deref() == Some(command)
    }

    pub fn kind_is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// `message` 字段 (若为字符串)。
    pub fn message(&self) -> Option<String> {
        self.body.get("message").and_then(Value::as_str).map(str::to_owned)
    }

    /// 取出某个负载字段的克隆值。
    pub fn field(&self, name: &str) -> Option<Value> {
        self.body.get(name).cloned()
    }

    /// 整个对象作为 JSON 值，用于把信封整体解码成负载结构体。
    pub fn body_value(&self) -> Value {
        Value::Object(self.body.clone())
    }
}

/// 分类完成后的入站信封。
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    /// `command == "list_cards" && status == "success"`
    CardList { cards: Vec<CardRecord> },
    /// `command == "upload_image"`，任意状态。
    UploadResult {
        status: Option<ResponseStatus>,
        message: Option<String>,
    },
    /// `command == "get_card_details"`，任意状态。
    CardDetails {
        status: Option<ResponseStatus>,
        card: Option<CardRecord>,
        message: Option<String>,
    },
    /// `type == "card_scanned"`
    CardScanned(CardScanEvent),
    /// `status == "error"`，没有更具体的规则命中。
    ServerError {
        command: Option<String>,
        message: Option<String>,
    },
    /// `type == "serial_data"`
    SerialData(SerialLogLine),
}

/// 信封种类，不携带负载。用于处理器注册表与日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    CardList,
    UploadResult,
    CardDetails,
    CardScanned,
    ServerError,
    SerialData,
}

impl InboundEnvelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            InboundEnvelope::CardList { .. } => EnvelopeKind::CardList,
            InboundEnvelope::UploadResult { .. } => EnvelopeKind::UploadResult,
            InboundEnvelope::CardDetails { .. } => EnvelopeKind::CardDetails,
            InboundEnvelope::CardScanned(_) => EnvelopeKind::CardScanned,
            InboundEnvelope::ServerError { .. } => EnvelopeKind::ServerError,
            InboundEnvelope::SerialData(_) => EnvelopeKind::SerialData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_envelope_extracts_discriminants() {
        let raw = RawEnvelope::from_value(json!({
            "command": "list_cards",
            "status": "success",
            "cards": [],
            "count": 0
        }))
        .unwrap();
        assert!(raw.command_is("list_cards"));
        assert_eq!(raw.response_status(), Some(ResponseStatus::Success));
        assert_eq!(raw.kind, None);
        assert_eq!(raw.field("cards"), Some(json!([])));
    }

    #[test]
    /// 非字符串的判别字段视为缺失，而不是解析失败。
    fn test_raw_envelope_ignores_non_text_discriminants() {
        let raw = RawEnvelope::from_value(json!({"command": 7, "type": null, "status": "error"})).unwrap();
        assert_eq!(raw.command, None);
        assert_eq!(raw.kind, None);
        assert_eq!(raw.response_status(), Some(ResponseStatus::Error));
        assert_eq!(raw.message(), None);
    }

    #[test]
    fn test_non_object_is_not_an_envelope() {
        assert!(RawEnvelope::from_value(json!([1, 2, 3])).is_none());
        assert!(RawEnvelope::from_value(json!("text")).is_none());
    }
}
