// card_viewer_client/src/state.rs

//! 客户端的派生视图状态。
//!
//! 状态只由事件循环修改，展示层通过 [`crate::event::ViewEvent`] 得知变化，
//! 也可以通过 `ClientHandle::snapshot` 取得一份副本。

use card_models::{CardRecord, SerialLogLine};
use std::collections::VecDeque;

use crate::event::MonitorStatus;

/// 视图状态。
#[derive(Debug, Clone)]
pub struct ViewState {
    /// 最近一次 `list_cards` 成功响应中的卡片。`None` 表示尚未收到过列表。
    cards: Option<Vec<CardRecord>>,
    serial_log: VecDeque<SerialLogLine>,
    serial_log_capacity: usize,
    monitor_status: MonitorStatus,
}

impl ViewState {
    pub fn new(serial_log_capacity: usize) -> Self {
        Self {
            cards: None,
            serial_log: VecDeque::new(),
            serial_log_capacity: serial_log_capacity.max(1),
            monitor_status: MonitorStatus::Disconnected,
        }
    }

    /// 整体替换卡片表格。
    pub fn apply_card_list(&mut self, cards: Vec<CardRecord>) {
        self.cards = Some(cards);
    }

    pub fn cards(&self) -> &[CardRecord] {
        self.cards.as_deref().unwrap_or(&[])
    }

    pub fn displayed_card_count(&self) -> usize {
        self.cards().len()
    }

    /// 收到过列表且列表为空时，表格显示"数据库中没有卡片"的占位行。
    pub fn shows_empty_state(&self) -> bool {
        matches!(&self.cards, Some(cards) if cards.is_empty())
    }

    /// 追加一行串口日志，超过容量时丢弃最旧的行。
    pub fn push_serial_line(&mut self, line: SerialLogLine) {
        if self.serial_log.len() == self.serial_log_capacity {
            self.serial_log.pop_front();
        }
        self.serial_log.push_back(line);
    }

    pub fn clear_serial_log(&mut self) {
        self.serial_log.clear();
    }

    pub fn serial_log(&self) -> impl Iterator<Item = &SerialLogLine> {
        self.serial_log.iter()
    }

    pub fn serial_log_len(&self) -> usize {
        self.serial_log.len()
    }

    pub fn monitor_status(&self) -> MonitorStatus {
        self.monitor_status
    }

    /// 更新监视状态，状态确实变化时返回 `true`。
    pub fn set_monitor_status(&mut self, status: MonitorStatus) -> bool {
        if self.monitor_status == status {
            return false;
        }
        self.monitor_status = status;
        true
    }
}
