//! 通用枚举模块。
//!
//! 本模块定义了卡片查看客户端各组件之间共享的枚举类型：
//! 通道角色 (`ChannelRole`)、服务端响应状态 (`ResponseStatus`) 以及串口日志方向 (`SerialDirection`)。
//!
//! 所有枚举都派生 `Serialize`, `Deserialize`, `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`，
//! 以支持数据交换、调试与比较。

use serde::{Deserialize, Serialize};
use std::fmt;

/// WebSocket 通道在客户端中扮演的角色。
///
/// 两个通道连接到同一个服务端地址，仅通过应用层协议区分：
/// 主通道负责卡片列表、详情与图片上传；监视通道负责串口透传日志。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    /// 主通道。关闭后总是自动重连。
    Primary,
    /// 串口监视通道。用户主动停止监视后不再重连。
    Monitor,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Primary => write!(f, "primary"),
            ChannelRole::Monitor => write!(f, "monitor"),
        }
    }
}

/// 服务端响应中的 `status` 字段。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ResponseStatus {
    /// 从线上的字符串值解析状态。未知取值返回 `None`，由路由层按"无状态"处理。
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "success" => Some(ResponseStatus::Success),
            "error" => Some(ResponseStatus::Error),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == ResponseStatus::Success
    }
}

/// 串口日志行的方向：设备发往服务端 (`incoming`) 或服务端发往设备 (`outgoing`)。
///
/// 服务端在设备输入无法解析或处理失败时会发送 `error` 方向的行。
/// 其他未知取值归入 `Other`，按输出行显示。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SerialDirection {
    Incoming,
    Outgoing,
    Error,
    #[serde(other)]
    Other,
}

impl fmt::Display for SerialDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialDirection::Incoming => write!(f, "← 输入"),
            SerialDirection::Outgoing | SerialDirection::Other => write!(f, "→ 输出"),
            SerialDirection::Error => write!(f, "⚠ 错误"),
        }
    }
}
