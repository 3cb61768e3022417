// card_viewer_client/src/ws_client/service.rs

//! 卡片查看客户端服务。
//!
//! [`CardViewerClient`] 拥有两个通道 (主通道与监视通道) 以及全部视图状态，
//! 在单个事件循环中依次处理：套接字事件、定时器事件、来自 [`ClientHandle`] 的命令，
//! 以及刷卡显示的到期。所有处理都在循环内同步完成，因此状态不需要任何锁。

use card_models::{CardRecord, CardScanEvent, ChannelRole, OutboundRequest, ResponseStatus, SerialLogLine};
use card_ws_utils::WsError;
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::card_scan_notifier::{sleep_until_deadline, CardScanNotifier};
use super::connection::{ChannelEvent, ChannelEventKind, CloseOutcome, Connection, ConnectionState};
use super::reconnect::ReconnectionPolicy;
use super::router::{self, DispatchOutcome, EnvelopeHandler};
use super::serial_passthrough;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::event::{MonitorStatus, ViewEvent};
use crate::state::ViewState;
use crate::upload::UploadForm;

/// 关闭时等待每个套接字任务发送 Close 帧的最长时间。
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// 应用层发给事件循环的命令。
#[derive(Debug)]
pub enum ClientCommand {
    RefreshCards,
    GetCardDetails { card_type: String, uid: String },
    UploadImage(UploadForm),
    StartMonitor,
    StopMonitor,
    /// 只清空本地串口日志视图，不涉及网络。
    ClearMonitor,
    /// 取得当前视图状态的副本。
    Snapshot(oneshot::Sender<ViewState>),
    Shutdown,
}

/// 客户端句柄。可克隆，事件循环结束后所有方法返回 `AppError::ClientStopped`。
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
}

impl ClientHandle {
    fn post(&self, command: ClientCommand) -> Result<(), AppError> {
        self.commands.send(command).map_err(|_| AppError::ClientStopped)
    }

    pub fn refresh_cards(&self) -> Result<(), AppError> {
        self.post(ClientCommand::RefreshCards)
    }

    pub fn get_card_details(&self, card_type: impl Into<String>, uid: impl Into<String>) -> Result<(), AppError> {
        self.post(ClientCommand::GetCardDetails { card_type: card_type.into(), uid: uid.into() })
    }

    pub fn upload_image(&self, form: UploadForm) -> Result<(), AppError> {
        self.post(ClientCommand::UploadImage(form))
    }

    pub fn start_monitor(&self) -> Result<(), AppError> {
        self.post(ClientCommand::StartMonitor)
    }

    pub fn stop_monitor(&self) -> Result<(), AppError> {
        self.post(ClientCommand::StopMonitor)
    }

    pub fn clear_monitor(&self) -> Result<(), AppError> {
        self.post(ClientCommand::ClearMonitor)
    }

    /// 取得事件循环当前的视图状态副本。
    pub async fn snapshot(&self) -> Result<ViewState, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(ClientCommand::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| AppError::ClientStopped)
    }

    pub fn shutdown(&self) -> Result<(), AppError> {
        self.post(ClientCommand::Shutdown)
    }
}

/// 定时器到期后投递回事件循环的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    ReconnectDue { role: ChannelRole, generation: u64 },
    /// 主通道未打开时被丢弃的卡片列表请求的重试。
    ListRetryDue,
    MonitorAutoStart,
}

pub struct CardViewerClient {
    config: AppConfig,
    policy: ReconnectionPolicy,
    primary: Connection,
    monitor: Connection,
    notifier: CardScanNotifier,
    state: ViewState,
    list_retry_pending: bool,
    /// 主通道打开前请求的卡片详情，打开后发送。
    pending_details: Option<OutboundRequest>,
    channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    view_tx: mpsc::UnboundedSender<ViewEvent>,
}

impl CardViewerClient {
    /// 创建客户端。返回的句柄用于发送命令，接收端用于订阅视图事件。
    pub fn new(config: AppConfig) -> (Self, ClientHandle, mpsc::UnboundedReceiver<ViewEvent>) {
        let policy = ReconnectionPolicy::from_config(&config);
        let (channel_tx, channel_events) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = mpsc::unbounded_channel();

        let url = config.ws_url();
        let primary = Connection::new(
            ChannelRole::Primary,
            url.clone(),
            OutboundRequest::ListCards,
            policy,
            channel_tx.clone(),
        );
        let monitor = Connection::new(ChannelRole::Monitor, url, OutboundRequest::StartSerialMonitor, policy, channel_tx);

        let client = Self {
            notifier: CardScanNotifier::new(config.card_display_duration()),
            state: ViewState::new(config.serial_log_capacity),
            config,
            policy,
            primary,
            monitor,
            list_retry_pending: false,
            pending_details: None,
            channel_events,
            commands,
            timer_tx,
            timer_rx,
            view_tx,
        };
        (client, ClientHandle { commands: command_tx }, view_rx)
    }

    /// 创建客户端并在后台任务中运行事件循环。
    pub fn spawn(config: AppConfig) -> (ClientHandle, mpsc::UnboundedReceiver<ViewEvent>, JoinHandle<()>) {
        let (client, handle, view_rx) = Self::new(config);
        let task = tokio::spawn(client.run());
        (handle, view_rx, task)
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// 事件循环。收到 `Shutdown` 命令或所有句柄都被丢弃后返回。
    pub async fn run(mut self) {
        info!("[客户端服务] 启动，服务端地址: {}", self.config.ws_url());
        self.primary.open();
        self.emit_connection_status(ChannelRole::Primary);
        if self.config.auto_start_monitor {
            self.schedule(TimerEvent::MonitorAutoStart, self.policy.request_retry_delay());
        }

        loop {
            let deadline = self.notifier.deadline();
            tokio::select! {
                Some(event) = self.channel_events.recv() => self.handle_channel_event(event),
                Some(timer) = self.timer_rx.recv() => self.handle_timer(timer),
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = sleep_until_deadline(deadline) => {
                    if self.notifier.expire_if_due(Instant::now()) {
                        self.emit(ViewEvent::CardScanCleared);
                    }
                }
            }
        }

        info!("[客户端服务] 正在关闭。");
        self.primary.shutdown(SHUTDOWN_GRACE).await;
        self.monitor.shutdown(SHUTDOWN_GRACE).await;
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        let ChannelEvent { role, generation, kind } = event;
        match kind {
            ChannelEventKind::Opened => {
                if self.connection_mut(role).handle_opened(generation) {
                    self.emit_connection_status(role);
                    self.on_channel_open(role);
                }
            }
            ChannelEventKind::Frame(text) => {
                if !self.connection(role).accepts_frame(generation) {
                    debug!("[客户端服务] 丢弃{}通道过期套接字的帧。", role);
                    return;
                }
                if let DispatchOutcome::Handled(kind) = router::dispatch_frame(role, &text, self) {
                    debug!("[客户端服务] {}通道消息已处理: {:?}", role, kind);
                }
            }
            ChannelEventKind::Closed { reason } => match self.connection_mut(role).handle_closed(generation) {
                CloseOutcome::Stale => {
                    debug!("[客户端服务] 忽略{}通道过期套接字的关闭事件。", role);
                }
                CloseOutcome::Reconnect(delay) => {
                    warn!(
                        "[客户端服务] {}通道已断开 ({})，{} 毫秒后重连。",
                        role,
                        reason.as_deref().unwrap_or("对端关闭"),
                        delay.as_millis()
                    );
                    self.emit_connection_status(role);
                    if role == ChannelRole::Monitor {
                        self.update_monitor_status(MonitorStatus::Reconnecting);
                    }
                    self.schedule(TimerEvent::ReconnectDue { role, generation }, delay);
                }
                CloseOutcome::Stopped => {
                    info!("[客户端服务] {}通道已按请求关闭，不再重连。", role);
                    self.emit_connection_status(role);
                    if role == ChannelRole::Monitor {
                        self.update_monitor_status(MonitorStatus::Disconnected);
                    }
                }
            },
        }
    }

    fn on_channel_open(&mut self, role: ChannelRole) {
        match role {
            ChannelRole::Primary => {
                if let Some(request) = self.pending_details.take() {
                    self.send_primary(&request);
                }
            }
            ChannelRole::Monitor => self.update_monitor_status(MonitorStatus::Connected),
        }
    }

    fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::ReconnectDue { role, generation } => {
                if self.connection(role).should_reconnect(generation) {
                    info!("[客户端服务] 正在重连{}通道...", role);
                    self.connection_mut(role).open();
                    self.emit_connection_status(role);
                } else {
                    debug!("[客户端服务] {}通道的重连定时器已失效。", role);
                }
            }
            TimerEvent::ListRetryDue => {
                self.list_retry_pending = false;
                self.request_card_list();
            }
            TimerEvent::MonitorAutoStart => {
                if self.monitor.state() == ConnectionState::Disconnected && !self.monitor.stop_requested() {
                    info!("[客户端服务] 自动开启串口监视。");
                    self.start_monitor();
                }
            }
        }
    }

    fn handle_command(&mut self, command: ClientCommand) {
        debug!("[客户端服务] 收到命令: {:?}", command);
        match command {
            ClientCommand::RefreshCards => self.request_card_list(),
            ClientCommand::GetCardDetails { card_type, uid } => {
                let request = OutboundRequest::GetCardDetails { card_type, uid };
                if self.primary.is_open() {
                    self.send_primary(&request);
                } else {
                    debug!("[客户端服务] 主通道尚未打开，卡片详情请求将在连接后发送。");
                    self.pending_details = Some(request);
                }
            }
            ClientCommand::UploadImage(form) => self.upload_image(form),
            ClientCommand::StartMonitor => self.start_monitor(),
            ClientCommand::StopMonitor => {
                info!("[客户端服务] 停止串口监视。");
                self.monitor.stop();
                self.emit_connection_status(ChannelRole::Monitor);
                self.update_monitor_status(MonitorStatus::Disconnected);
            }
            ClientCommand::ClearMonitor => {
                self.state.clear_serial_log();
                self.emit(ViewEvent::SerialLogCleared);
            }
            ClientCommand::Snapshot(reply) => {
                // 请求方已放弃等待时忽略
                let _ = reply.send(self.state.clone());
            }
            // 在 run() 中处理
            ClientCommand::Shutdown => {}
        }
    }

    fn start_monitor(&mut self) {
        let running = matches!(self.monitor.state(), ConnectionState::Open | ConnectionState::Connecting);
        if running && !self.monitor.stop_requested() {
            debug!("[客户端服务] 串口监视已在运行。");
            return;
        }
        self.monitor.open();
        self.emit_connection_status(ChannelRole::Monitor);
    }

    /// 请求卡片列表。主通道未打开时安排一次重试，同一时刻最多只有一个重试定时器。
    fn request_card_list(&mut self) {
        match self.primary.send(&OutboundRequest::ListCards) {
            Ok(()) => {}
            Err(WsError::NotConnected) => {
                if self.list_retry_pending {
                    debug!("[客户端服务] 卡片列表重试已在等待中。");
                    return;
                }
                debug!(
                    "[客户端服务] 主通道未打开，{} 毫秒后重试卡片列表请求。",
                    self.policy.request_retry_delay().as_millis()
                );
                self.list_retry_pending = true;
                self.schedule(TimerEvent::ListRetryDue, self.policy.request_retry_delay());
            }
            Err(e) => warn!("[客户端服务] 发送卡片列表请求失败: {}", e),
        }
    }

    fn upload_image(&mut self, form: UploadForm) {
        let request = match form.into_request() {
            Ok(request) => request,
            Err(e) => {
                warn!("[客户端服务] 上传请求被拒绝: {}", e);
                self.emit(ViewEvent::UploadRejected { reason: e.to_string() });
                return;
            }
        };
        let filename = match &request {
            OutboundRequest::UploadImage { filename, .. } => filename.clone(),
            _ => String::new(),
        };
        match self.primary.send(&request) {
            Ok(()) => {
                info!("[客户端服务] 正在上传图片 {}", filename);
                self.emit(ViewEvent::UploadInProgress { filename });
            }
            Err(e) => {
                warn!("[客户端服务] 上传请求未能发送: {}", e);
                self.emit(ViewEvent::UploadRejected { reason: AppError::from(e).to_string() });
            }
        }
    }

    /// 在主通道上发送请求，失败时只记日志 (请求被丢弃)。
    fn send_primary(&mut self, request: &OutboundRequest) {
        if let Err(e) = self.primary.send(request) {
            warn!("[客户端服务] 主通道请求 '{}' 被丢弃: {}", request.command(), e);
        }
    }

    fn schedule(&self, timer: TimerEvent, delay: Duration) {
        let timer_tx = self.timer_tx.clone();
        // 到期时间在安排时确定，而不是在任务首次运行时
        let deadline = Instant::now() + delay;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // 事件循环已结束时忽略
            let _ = timer_tx.send(timer);
        });
    }

    fn connection(&self, role: ChannelRole) -> &Connection {
        match role {
            ChannelRole::Primary => &self.primary,
            ChannelRole::Monitor => &self.monitor,
        }
    }

    fn connection_mut(&mut self, role: ChannelRole) -> &mut Connection {
        match role {
            ChannelRole::Primary => &mut self.primary,
            ChannelRole::Monitor => &mut self.monitor,
        }
    }

    fn update_monitor_status(&mut self, status: MonitorStatus) {
        if self.state.set_monitor_status(status) {
            self.emit(ViewEvent::MonitorStatusChanged { status });
        }
    }

    fn emit_connection_status(&self, role: ChannelRole) {
        self.emit(ViewEvent::ConnectionStatus { role, state: self.connection(role).state() });
    }

    fn emit(&self, event: ViewEvent) {
        if self.view_tx.send(event).is_err() {
            debug!("[客户端服务] 视图事件接收端已关闭。");
        }
    }
}

impl EnvelopeHandler for CardViewerClient {
    fn on_card_list(&mut self, cards: Vec<CardRecord>) {
        info!("[客户端服务] 收到卡片列表，共 {} 张。", cards.len());
        self.state.apply_card_list(cards.clone());
        self.emit(ViewEvent::CardListUpdated { cards });
    }

    fn on_upload_result(&mut self, status: Option<ResponseStatus>, message: Option<String>) {
        let success = status.is_some_and(ResponseStatus::is_success);
        let message = message.unwrap_or_else(|| if success { "上传成功".to_string() } else { "上传失败".to_string() });
        if success {
            info!("[客户端服务] 图片上传成功: {}", message);
        } else {
            warn!("[客户端服务] 图片上传失败: {}", message);
        }
        self.emit(ViewEvent::UploadStatus { success, message });
        if success {
            self.request_card_list();
            self.emit(ViewEvent::UploadFormReset);
        }
    }

    fn on_card_details(&mut self, status: Option<ResponseStatus>, card: Option<CardRecord>, message: Option<String>) {
        match (status, card) {
            (Some(ResponseStatus::Success), Some(card)) => {
                let image_url = if card.has_image {
                    card.image_file().map(|file| self.config.media_url(file))
                } else {
                    None
                };
                info!("[客户端服务] 已加载卡片详情: {} {}", card.card_type, card.uid);
                self.emit(ViewEvent::CardDetailsLoaded { card, image_url });
            }
            _ => {
                let message = message.unwrap_or_else(|| "获取卡片详情失败".to_string());
                warn!("[客户端服务] 获取卡片详情失败: {}", message);
                self.emit(ViewEvent::CardDetailsFailed { message });
            }
        }
    }

    fn on_card_scanned(&mut self, role: ChannelRole, scan: CardScanEvent) {
        debug!("[客户端服务] {}通道收到刷卡事件。", role);
        let displayed = self.notifier.show(scan);
        self.emit(ViewEvent::CardScanDisplayed(displayed));
    }

    fn on_server_error(&mut self, role: ChannelRole, command: Option<String>, message: Option<String>) {
        let message = message.unwrap_or_else(|| "未知错误".to_string());
        error!("[客户端服务] {}通道服务端返回错误 (命令 {:?}): {}", role, command, message);
        self.emit(ViewEvent::ServerError { role, command, message });
    }

    fn on_serial_data(&mut self, line: SerialLogLine) {
        let lookup = serial_passthrough::inspect(&line);
        self.state.push_serial_line(line.clone());
        self.emit(ViewEvent::SerialLineAppended(line));
        if let Some(request) = lookup {
            self.send_primary(&request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::SelectedFile;
    use card_models::CardUid;

    // 指向一个不会被连接的端口：这些测试不运行事件循环，主通道保持未打开。
    fn offline_client() -> (CardViewerClient, ClientHandle, mpsc::UnboundedReceiver<ViewEvent>) {
        let config = AppConfig {
            ws_port: 1,
            request_retry_delay_ms: 1000,
            ..AppConfig::default()
        };
        CardViewerClient::new(config)
    }

    // 让到期的定时器任务有机会运行。
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    /// 主通道未打开时的卡片列表请求在固定延迟后重试，且只有一个重试定时器。
    async fn test_list_request_retry_is_single_and_delayed() {
        let (mut client, _handle, _views) = offline_client();
        client.request_card_list();
        client.request_card_list();
        assert!(client.list_retry_pending);

        tokio::time::advance(Duration::from_millis(999)).await;
        settle().await;
        assert!(client.timer_rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(client.timer_rx.try_recv(), Ok(TimerEvent::ListRetryDue));
        assert!(client.timer_rx.try_recv().is_err());

        // 到期时主通道仍未打开：再次安排重试
        client.handle_timer(TimerEvent::ListRetryDue);
        assert!(client.list_retry_pending);
    }

    #[tokio::test]
    async fn test_incomplete_upload_is_rejected_locally() {
        let (mut client, _handle, mut views) = offline_client();
        client.handle_command(ClientCommand::UploadImage(UploadForm::new("", "04AABBCC", None)));
        match drain(&mut views).as_slice() {
            [ViewEvent::UploadRejected { reason }] => assert!(reason.contains("card_type")),
            other => panic!("预期一个 UploadRejected 事件，实际: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_while_disconnected_is_rejected() {
        let (mut client, _handle, mut views) = offline_client();
        let form = UploadForm::new("KEY", "04AABBCC", Some(SelectedFile::new("k.png", vec![1, 2, 3])));
        client.handle_command(ClientCommand::UploadImage(form));
        assert!(matches!(drain(&mut views).as_slice(), [ViewEvent::UploadRejected { .. }]));
    }

    #[tokio::test]
    async fn test_upload_result_success_resets_form() {
        let (mut client, _handle, mut views) = offline_client();
        client.on_upload_result(Some(ResponseStatus::Success), Some("图片已保存".into()));
        let events = drain(&mut views);
        assert_eq!(
            events,
            vec![
                ViewEvent::UploadStatus { success: true, message: "图片已保存".into() },
                ViewEvent::UploadFormReset,
            ]
        );
        // 刷新请求因主通道未打开而进入重试
        assert!(client.list_retry_pending);

        client.on_upload_result(Some(ResponseStatus::Error), None);
        assert_eq!(
            drain(&mut views),
            vec![ViewEvent::UploadStatus { success: false, message: "上传失败".into() }]
        );
    }

    #[tokio::test]
    async fn test_card_details_image_url() {
        let (mut client, _handle, mut views) = offline_client();
        let card = CardRecord {
            card_type: "KEY".into(),
            uid: CardUid::Bytes(vec![9, 37, 12, 5]),
            date_added: Some("2024-01-01".into()),
            date_uploaded: Some("2024-01-02".into()),
            has_image: true,
            image_filename: Some("key_09250C05.jpg".into()),
        };
        client.on_card_details(Some(ResponseStatus::Success), Some(card.clone()), None);
        assert_eq!(
            drain(&mut views),
            vec![ViewEvent::CardDetailsLoaded {
                card: card.clone(),
                image_url: Some("http://localhost:8080/media/key_09250C05.jpg".into()),
            }]
        );

        let without_image = CardRecord { has_image: false, ..card };
        client.on_card_details(Some(ResponseStatus::Success), Some(without_image), None);
        assert!(matches!(
            drain(&mut views).as_slice(),
            [ViewEvent::CardDetailsLoaded { image_url: None, .. }]
        ));

        client.on_card_details(Some(ResponseStatus::Error), None, Some("未找到卡片".into()));
        assert_eq!(drain(&mut views), vec![ViewEvent::CardDetailsFailed { message: "未找到卡片".into() }]);
    }

    #[tokio::test]
    /// 服务端错误只上报，不修改状态。
    async fn test_server_error_does_not_mutate_state() {
        let (mut client, _handle, mut views) = offline_client();
        client.on_card_list(vec![]);
        drain(&mut views);

        client.on_server_error(ChannelRole::Primary, Some("list_cards".into()), None);
        assert_eq!(
            drain(&mut views),
            vec![ViewEvent::ServerError {
                role: ChannelRole::Primary,
                command: Some("list_cards".into()),
                message: "未知错误".into(),
            }]
        );
        assert!(client.state().shows_empty_state());
    }

    #[tokio::test]
    async fn test_clear_monitor_empties_serial_log() {
        let (mut client, _handle, mut views) = offline_client();
        client.on_serial_data(SerialLogLine {
            message: "boot ok".into(),
            direction: card_models::SerialDirection::Incoming,
            timestamp: None,
        });
        assert_eq!(client.state().serial_log_len(), 1);
        client.handle_command(ClientCommand::ClearMonitor);
        assert_eq!(client.state().serial_log_len(), 0);
        assert_eq!(drain(&mut views).last(), Some(&ViewEvent::SerialLogCleared));
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_client() {
        let (client, handle, _views) = offline_client();
        drop(client);
        assert!(matches!(handle.refresh_cards(), Err(AppError::ClientStopped)));
    }
}
