// card_viewer_client/src/ws_client/card_scan_notifier.rs

//! 刷卡结果的限时显示。
//!
//! 任意时刻最多显示一条刷卡结果：新结果立即替换旧结果并重新开始计时，
//! 计时结束后显示被清除。没有队列，也不会合并两次刷卡。

use card_models::CardScanEvent;
use chrono::Local;
use log::{debug, info};
use std::time::Duration;
use tokio::time::Instant;

use crate::event::DisplayedScan;

#[derive(Debug)]
pub struct CardScanNotifier {
    display_for: Duration,
    current: Option<DisplayedScan>,
    deadline: Option<Instant>,
}

impl CardScanNotifier {
    pub fn new(display_for: Duration) -> Self {
        Self { display_for, current: None, deadline: None }
    }

    /// 显示一条新结果，替换当前结果并重置到期时间。
    pub fn show(&mut self, scan: CardScanEvent) -> DisplayedScan {
        if self.current.is_some() {
            debug!("[刷卡显示] 新的刷卡结果覆盖了尚未到期的显示。");
        }
        info!(
            "[刷卡显示] 显示刷卡结果: 类型 {}，UID {}，{}",
            scan.card_type_or_unknown(),
            scan.card_uid_or_dash(),
            if scan.access_granted { "允许通行" } else { "拒绝通行" }
        );
        let displayed = DisplayedScan { scan, shown_at: Local::now() };
        self.current = Some(displayed.clone());
        self.deadline = Some(Instant::now() + self.display_for);
        displayed
    }

    pub fn current(&self) -> Option<&DisplayedScan> {
        self.current.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 到期则清除显示并返回 `true`。
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.current = None;
                self.deadline = None;
                debug!("[刷卡显示] 显示时间到期，已清除。");
                true
            }
            _ => false,
        }
    }
}

/// 等待到期时间；没有显示中的结果时永远挂起，便于放进 `select!`。
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(uid: &str) -> CardScanEvent {
        CardScanEvent {
            card_type: Some("KEY".into()),
            card_uid: Some(uid.into()),
            access_granted: true,
            has_image: false,
            image_url: None,
            timestamp: None,
        }
    }

    #[tokio::test(start_paused = true)]
    /// 相隔 2 秒的两次刷卡：只显示第二次，并在第二次之后 10 秒清除。
    async fn test_latest_scan_wins_and_resets_timer() {
        let mut notifier = CardScanNotifier::new(Duration::from_secs(10));
        let start = Instant::now();

        notifier.show(scan("01"));
        tokio::time::advance(Duration::from_secs(2)).await;
        notifier.show(scan("02"));
        assert_eq!(notifier.current().unwrap().scan.card_uid.as_deref(), Some("02"));

        // 第一次刷卡的 10 秒到点时不应清除
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(!notifier.expire_if_due(Instant::now()));
        assert!(notifier.current().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(Instant::now() - start, Duration::from_secs(12));
        assert!(notifier.expire_if_due(Instant::now()));
        assert!(notifier.current().is_none());
        assert!(notifier.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline_wakes_at_deadline() {
        let mut notifier = CardScanNotifier::new(Duration::from_secs(10));
        notifier.show(scan("01"));
        let start = Instant::now();
        sleep_until_deadline(notifier.deadline()).await;
        assert_eq!(Instant::now() - start, Duration::from_secs(10));
        assert!(notifier.expire_if_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_never_wakes() {
        let result = tokio::time::timeout(Duration::from_secs(60), sleep_until_deadline(None)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_expire_without_display_is_noop() {
        let mut notifier = CardScanNotifier::new(Duration::from_secs(10));
        assert!(!notifier.expire_if_due(Instant::now()));
    }
}
