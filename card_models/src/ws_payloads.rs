//! 包含 WebSocket 通信中使用的各种负载结构体定义。
//!
//! 出站方向只有一种形状：`{command, ...参数}`，由 [`OutboundRequest`] 表示。
//! 入站方向的负载 (卡片记录、串口日志行、刷卡事件) 在此定义，
//! 具体的信封分类见 `envelope` 模块。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enums::SerialDirection;

// --- 命令名称常量 ---

/// 请求卡片列表。
pub const LIST_CARDS_COMMAND: &str = "list_cards";
/// 按 类型 + UID 请求卡片详情。
pub const GET_CARD_DETAILS_COMMAND: &str = "get_card_details";
/// 仅按 UID 请求卡片详情，服务端以 `card_scanned` 事件回复。
pub const GET_CARD_DETAILS_BY_UID_COMMAND: &str = "get_card_details_by_uid";
/// 在当前连接上开启串口监视。
pub const START_SERIAL_MONITOR_COMMAND: &str = "start_serial_monitor";
/// 上传卡片图片。
pub const UPLOAD_IMAGE_COMMAND: &str = "upload_image";

// --- 入站 `type` 取值常量 ---

pub const CARD_SCANNED_TYPE: &str = "card_scanned";
pub const SERIAL_DATA_TYPE: &str = "serial_data";
/// 串口日志内嵌的刷卡帧的 `type` 取值，同时也是预过滤使用的子串标记。
pub const CARD_DATA_FRAME_TYPE: &str = "cardData";

/// 客户端发往服务端的请求。
///
/// 序列化为 `{"command": "<名称>", ...参数}`，命令名称与上面的常量一致。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OutboundRequest {
    /// `{command:"list_cards"}`
    ListCards,
    /// `{command:"get_card_details", card_type, uid}`
    GetCardDetails { card_type: String, uid: String },
    /// `{command:"get_card_details_by_uid", uid}`
    GetCardDetailsByUid { uid: String },
    /// `{command:"start_serial_monitor"}`
    StartSerialMonitor,
    /// `{command:"upload_image", card_type, uid, image_data, filename}`
    ///
    /// `image_data` 为 data URL (`data:<mime>;base64,<内容>`)。
    UploadImage {
        card_type: String,
        uid: String,
        image_data: String,
        filename: String,
    },
}

impl OutboundRequest {
    /// 返回请求的命令名称，主要用于日志。
    pub fn command(&self) -> &'static str {
        match self {
            OutboundRequest::ListCards => LIST_CARDS_COMMAND,
            OutboundRequest::GetCardDetails { .. } => GET_CARD_DETAILS_COMMAND,
            OutboundRequest::GetCardDetailsByUid { .. } => GET_CARD_DETAILS_BY_UID_COMMAND,
            OutboundRequest::StartSerialMonitor => START_SERIAL_MONITOR_COMMAND,
            OutboundRequest::UploadImage { .. } => UPLOAD_IMAGE_COMMAND,
        }
    }
}

/// 卡片 UID。
///
/// 服务端在 `list_cards` 响应中以十六进制字符串返回 UID，
/// 在 `get_card_details` 响应中则以整数序列返回，两种形状都要接受。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CardUid {
    Bytes(Vec<u32>),
    Text(String),
}

impl CardUid {
    /// 规范化为大写十六进制字符串，例如 `[4, 170]` -> `04AA`。
    pub fn to_hex(&self) -> String {
        match self {
            CardUid::Bytes(bytes) => bytes.iter().map(|b| format!("{:02X}", b)).collect(),
            CardUid::Text(text) => text
                .chars()
                .filter(|c| c.is_ascii_hexdigit())
                .collect::<String>()
                .to_uppercase(),
        }
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardUid::Bytes(bytes) => {
                let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            CardUid::Text(text) => write!(f, "{}", text),
        }
    }
}

/// 服务端数据库中的一条卡片记录。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub card_type: String,
    pub uid: CardUid,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_uploaded: Option<String>,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default)]
    pub image_filename: Option<String>,
}

impl CardRecord {
    /// 可用于构造媒体 URL 的图片文件名。没有文件名 (或为空) 时返回 `None`。
    pub fn image_file(&self) -> Option<&str> {
        self.image_filename.as_deref().filter(|name| !name.is_empty())
    }
}

/// 串口监视通道中转发的一行设备日志。接收后只读，不做修改。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SerialLogLine {
    pub message: String,
    pub direction: SerialDirection,
    /// 服务端给出的 ISO-8601 时间文本，原样保留。
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// 刷卡事件 (`type: "card_scanned"`)。
///
/// 既可能由服务端直接推送，也可能是对 `get_card_details_by_uid` 的回复。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CardScanEvent {
    #[serde(rename = "cardType", default)]
    pub card_type: Option<String>,
    #[serde(rename = "cardUID", default)]
    pub card_uid: Option<String>,
    #[serde(rename = "accessGranted", default)]
    pub access_granted: bool,
    #[serde(rename = "hasImage", default)]
    pub has_image: bool,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl CardScanEvent {
    pub fn card_type_or_unknown(&self) -> &str {
        self.card_type.as_deref().filter(|t| !t.is_empty()).unwrap_or("UNKNOWN")
    }

    pub fn card_uid_or_dash(&self) -> &str {
        self.card_uid.as_deref().filter(|u| !u.is_empty()).unwrap_or("-")
    }

    /// 仅当 `hasImage` 为真且给出了 `imageUrl` 时才显示图片。
    pub fn display_image_url(&self) -> Option<&str> {
        if self.has_image {
            self.image_url.as_deref().filter(|url| !url.is_empty())
        } else {
            None
        }
    }
}
