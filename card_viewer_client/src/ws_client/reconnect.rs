// card_viewer_client/src/ws_client/reconnect.rs

//! 固定延迟的重连策略。
//!
//! 通道意外关闭后，等待固定的延迟再重新打开，无退避增长、无次数上限。
//! 控制服务端位于本机且长期在线，无限次固定延迟重试是有意的简化。
//! 另有一个更短的固定延迟，用于主通道未打开时被丢弃的请求的重试。

use card_models::ChannelRole;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectionPolicy {
    reconnect_delay: Duration,
    request_retry_delay: Duration,
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(3), Duration::from_secs(1))
    }
}

impl ReconnectionPolicy {
    pub fn fixed(reconnect_delay: Duration, request_retry_delay: Duration) -> Self {
        Self { reconnect_delay, request_retry_delay }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::fixed(config.reconnect_delay(), config.request_retry_delay())
    }

    /// 通道关闭后是否重连，以及等待多久。
    ///
    /// 主通道总是重连；监视通道在用户主动停止后不再重连。
    pub fn reconnect_delay_after_close(&self, role: ChannelRole, stop_requested: bool) -> Option<Duration> {
        match role {
            ChannelRole::Primary => Some(self.reconnect_delay),
            ChannelRole::Monitor if stop_requested => None,
            ChannelRole::Monitor => Some(self.reconnect_delay),
        }
    }

    pub fn request_retry_delay(&self) -> Duration {
        self.request_retry_delay
    }
}
