// card_viewer_client/src/ws_client/connection.rs

//! 单个 WebSocket 通道的生命周期管理。
//!
//! 每个 [`Connection`] 独占一个套接字：套接字本身运行在一个后台任务里，
//! 收到的事件 (打开、文本帧、关闭) 打上通道角色与"代次"后送入事件循环。
//! 每次 `open()` 都会递增代次并中止上一代的套接字任务，
//! 因此同一角色在任意时刻最多只有一个存活的套接字，旧代次的迟到事件会被忽略。
//!
//! 状态机: `Disconnected → Connecting → Open → (Closing | Disconnected)`。

use card_models::{ChannelRole, OutboundRequest};
use card_ws_utils::client::transport::{self, encode_request};
use card_ws_utils::WsError;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::reconnect::ReconnectionPolicy;

/// 通道连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// 已请求主动关闭，等待套接字任务结束。
    Closing,
}

/// 套接字任务上报给事件循环的事件。
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub role: ChannelRole,
    pub generation: u64,
    pub kind: ChannelEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEventKind {
    Opened,
    /// 一条原始文本帧，解析由消息路由器负责。
    Frame(String),
    /// 连接失败、出错或被关闭。`reason` 仅用于日志。
    Closed { reason: Option<String> },
}

/// 处理关闭事件的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// 事件来自已被替换的旧套接字，忽略。
    Stale,
    /// 按策略在给定延迟后重连。
    Reconnect(Duration),
    /// 通道被主动停止，不再重连。
    Stopped,
}

pub struct Connection {
    role: ChannelRole,
    url: String,
    state: ConnectionState,
    generation: u64,
    stop_requested: bool,
    /// 进入 `Open` 后立即发送的请求 (相当于 onReady 回调)。
    ready_request: OutboundRequest,
    policy: ReconnectionPolicy,
    /// 写入该通道的文本帧由套接字任务发送；丢弃发送端即请求关闭。
    outbound: Option<mpsc::UnboundedSender<String>>,
    socket_task: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl Connection {
    pub fn new(
        role: ChannelRole,
        url: String,
        ready_request: OutboundRequest,
        policy: ReconnectionPolicy,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        Self {
            role,
            url,
            state: ConnectionState::Disconnected,
            generation: 0,
            stop_requested: false,
            ready_request,
            policy,
            outbound: None,
            socket_task: None,
            events,
        }
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// 建立 (或重建) 通道。上一代套接字若仍存活则被中止。
    pub fn open(&mut self) {
        if let Some(previous) = self.socket_task.take() {
            debug!("[{}通道] 中止上一代套接字任务 (代次 {})", self.role, self.generation);
            previous.abort();
        }
        self.stop_requested = false;
        self.generation += 1;
        self.transition(ConnectionState::Connecting);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);
        self.socket_task = Some(tokio::spawn(run_socket(
            self.role,
            self.generation,
            self.url.clone(),
            outbound_rx,
            self.events.clone(),
        )));
    }

    /// 处理套接字任务的"已打开"事件。返回 `true` 表示通道进入 `Open` 且已发送就绪请求。
    pub fn handle_opened(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!("[{}通道] 忽略过期的打开事件 (代次 {}，当前 {})", self.role, generation, self.generation);
            return false;
        }
        self.transition(ConnectionState::Open);
        let ready = self.ready_request.clone();
        if let Err(e) = self.send(&ready) {
            warn!("[{}通道] 发送就绪请求 '{}' 失败: {}", self.role, ready.command(), e);
        }
        true
    }

    /// 当前代次且处于 `Open` 状态的文本帧才会交给路由器。
    pub fn accepts_frame(&self, generation: u64) -> bool {
        generation == self.generation && self.state == ConnectionState::Open
    }

    /// 处理套接字任务的关闭事件，转入 `Disconnected` 并询问重连策略。
    pub fn handle_closed(&mut self, generation: u64) -> CloseOutcome {
        if generation != self.generation {
            return CloseOutcome::Stale;
        }
        self.outbound = None;
        self.socket_task = None;
        self.transition(ConnectionState::Disconnected);
        match self.policy.reconnect_delay_after_close(self.role, self.stop_requested) {
            Some(delay) => CloseOutcome::Reconnect(delay),
            None => CloseOutcome::Stopped,
        }
    }

    /// 重连定时器到期时是否应当重新打开。定时器期间通道被手动重开或停止都会使其失效。
    pub fn should_reconnect(&self, generation: u64) -> bool {
        !self.stop_requested && generation == self.generation && self.state == ConnectionState::Disconnected
    }

    /// 把请求序列化为 JSON 并发送。
    ///
    /// 通道未处于 `Open` 时立即返回 `WsError::NotConnected`，调用方应视为"请求已丢弃"。
    /// 不做任何内部缓冲。
    pub fn send(&self, request: &OutboundRequest) -> Result<(), WsError> {
        if self.state != ConnectionState::Open {
            return Err(WsError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(WsError::NotConnected)?;
        let text = encode_request(request)?;
        outbound.send(text).map_err(|_| WsError::SendErrorClosed)?;
        debug!("[{}通道] 请求已排入发送: {}", self.role, request.command());
        Ok(())
    }

    /// 主动停止通道：设置停止标志并关闭套接字。之后的关闭事件不会触发重连
    /// (主通道除外，策略对主通道忽略该标志)。
    pub fn stop(&mut self) {
        self.stop_requested = true;
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.transition(ConnectionState::Closing);
        // 丢弃发送端后，套接字任务会发送 Close 帧并结束
        self.outbound = None;
    }

    /// 停止通道并等待套接字任务发出 Close 帧后结束，超过 `grace` 仍未结束则中止。
    pub async fn shutdown(&mut self, grace: Duration) {
        self.stop();
        let Some(mut task) = self.socket_task.take() else {
            return;
        };
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!("[{}通道] 套接字任务在 {:?} 内未结束，强制中止。", self.role, grace);
            task.abort();
        }
        self.outbound = None;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("[{}通道] 状态变更: {:?} -> {:?} (代次 {})", self.role, self.state, next, self.generation);
            self.state = next;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.socket_task.take() {
            task.abort();
        }
    }
}

/// 套接字任务：连接、转发收发，直到连接关闭或发送端被丢弃。
async fn run_socket(
    role: ChannelRole,
    generation: u64,
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let emit = |kind: ChannelEventKind| {
        // 事件循环已结束时发送失败，无需处理
        let _ = events.send(ChannelEvent { role, generation, kind });
    };

    let mut conn = match transport::connect_client(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("[{}通道] 连接 {} 失败: {}", role, url, e);
            emit(ChannelEventKind::Closed { reason: Some(e.to_string()) });
            return;
        }
    };
    emit(ChannelEventKind::Opened);

    let reason = loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = transport::send_text(&mut conn.ws_sender, text).await {
                        warn!("[{}通道] 发送失败: {}", role, e);
                        break Some(e.to_string());
                    }
                }
                None => {
                    info!("[{}通道] 收到关闭请求，正在关闭连接。", role);
                    if let Err(e) = conn.close().await {
                        debug!("[{}通道] 发送 Close 帧失败: {}", role, e);
                    }
                    break Some("主动关闭".to_string());
                }
            },
            incoming = transport::receive_text(&mut conn.ws_receiver) => match incoming {
                Some(Ok(text)) => emit(ChannelEventKind::Frame(text)),
                Some(Err(e)) if !transport::is_fatal(&e) => {
                    warn!("[{}通道] 跳过无法处理的帧: {}", role, e);
                }
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            },
        }
    };

    info!("[{}通道] 连接已关闭 (原因: {})", role, reason.as_deref().unwrap_or("对端关闭"));
    emit(ChannelEventKind::Closed { reason });
}
