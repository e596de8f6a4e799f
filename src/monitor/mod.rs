//! Cross-device alert aggregation and notification throttling.
//!
//! The monitor is a stateless reducer over group snapshots plus two
//! throttle timestamps. It decides, per snapshot, whether the group is
//! in alert, whether to emit a log line, and whether to dispatch a
//! notification, enforcing at most one notification per cooldown
//! window no matter how many devices or snapshots report the fall.

mod throttle;

pub use throttle::ThrottleGate;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;

use crate::collab::NotificationDispatcher;
use crate::config::MonitorConfig;
use crate::domain::{GroupId, GroupSettings, GroupSnapshot, NotificationPayload};
use crate::store::StatusStore;
use crate::Result;

/// Observes one group's status records and throttles notifications.
///
/// Safe to invoke concurrently: overlapping snapshot deliveries race on
/// the throttle gates, and exactly one invocation wins a notification
/// window.
pub struct GroupMonitor {
    config: MonitorConfig,
    group: GroupId,
    store: Arc<dyn StatusStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    notify_gate: ThrottleGate,
    log_gate: ThrottleGate,
}

/// What happens to an active alert in the current snapshot, decided
/// from whether a target is configured and whether the notification
/// window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlertDisposition {
    /// No notification target configured; dispatch is skipped.
    NoTarget,
    /// A notification went out recently; the window must elapse first.
    CoolingDown,
    /// Target configured and window open; a dispatch will be attempted.
    Dispatching,
}

impl AlertDisposition {
    fn of(has_target: bool, window_open: bool) -> Self {
        match (has_target, window_open) {
            (false, _) => Self::NoTarget,
            (true, false) => Self::CoolingDown,
            (true, true) => Self::Dispatching,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::NoTarget => "no destination configured, dispatch skipped",
            Self::CoolingDown => "waiting out notification cooldown",
            Self::Dispatching => "dispatching notification",
        }
    }
}

impl GroupMonitor {
    /// Create a monitor for one group. Throttle state starts at
    /// "never notified"; after a restart the worst case is one extra
    /// notification.
    pub fn new(
        config: MonitorConfig,
        group: GroupId,
        store: Arc<dyn StatusStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let notify_gate = ThrottleGate::new(config.notify_cooldown);
        let log_gate = ThrottleGate::new(config.log_throttle);
        Self {
            config,
            group,
            store,
            dispatcher,
            notify_gate,
            log_gate,
        }
    }

    /// The group this monitor observes.
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Get configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Overwrite the group's notification target. Last writer wins;
    /// concurrent edits by two operators simply leave one value.
    pub async fn save_settings(&self, target: &str) -> Result<()> {
        let settings = GroupSettings::with_target(target)?;
        self.store.write_settings(&self.group, settings).await
    }

    /// Reduce one group snapshot: log (throttled) and notify
    /// (throttled) if any device reports a fall.
    pub async fn on_snapshot(&self, snapshot: &GroupSnapshot) {
        let Some((device, record)) = snapshot.representative_fall() else {
            return;
        };

        let now_ms = Utc::now().timestamp_millis();
        let target = snapshot.settings.notify_target.as_deref();
        let window_open = self.notify_gate.is_open(now_ms);

        if self.log_gate.try_claim(now_ms) {
            let disposition = AlertDisposition::of(target.is_some(), window_open);
            tracing::info!(
                group = %self.group,
                device = %device,
                confidence = record.confidence,
                "fall alert active; {}",
                disposition.reason()
            );
        }

        let Some(target) = target else {
            return;
        };

        // Lock then send: the window is consumed before the dispatch
        // call, so an overlapping snapshot cannot also decide to send.
        if self.notify_gate.try_claim(now_ms) {
            let payload =
                NotificationPayload::from_record(self.group.clone(), device.clone(), record);
            if let Err(e) = self.dispatcher.send(target, &payload).await {
                // Window stays consumed; the next window re-attempts
                // naturally if the alert persists.
                tracing::warn!(
                    group = %self.group,
                    target_address = target,
                    error = %e,
                    "notification dispatch failed"
                );
            } else {
                tracing::info!(
                    group = %self.group,
                    target_address = target,
                    device = %payload.device,
                    "notification dispatched"
                );
            }
        }
    }

    /// Consume the store's watch stream until it closes.
    ///
    /// A lagged receiver skips straight to a fresh read of the group:
    /// only the latest state per device matters.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut snapshots = self.store.watch(&self.group);
        loop {
            match snapshots.recv().await {
                Ok(snapshot) => self.on_snapshot(&snapshot).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(group = %self.group, skipped, "watch lagged, re-reading group");
                    let snapshot = self.store.read_group(&self.group).await?;
                    self.on_snapshot(&snapshot).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn rewind_notify_window(&self) {
        let ms = self.config.notify_cooldown.as_millis() as i64;
        self.notify_gate
            .force_last(Utc::now().timestamp_millis() - ms - 1_000);
    }

    #[cfg(test)]
    fn rewind_log_window(&self) {
        let ms = self.config.log_throttle.as_millis() as i64;
        self.log_gate
            .force_last(Utc::now().timestamp_millis() - ms - 1_000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceId, DeviceState, DeviceStatusRecord};
    use crate::store::MemoryStatusStore;
    use crate::WatchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Collects formatted log output so tests can assert on it.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn lines_containing(&self, needle: &str) -> usize {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|line| line.contains(needle))
                .count()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs() -> (CapturedLog, tracing::subscriber::DefaultGuard) {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("fallwatch=info"))
            .with_writer(log.clone())
            .finish();
        (log, tracing::subscriber::set_default(subscriber))
    }

    struct CountingDispatcher {
        sent: AtomicUsize,
        fail: bool,
    }

    impl CountingDispatcher {
        fn new() -> Self {
            Self {
                sent: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.sent.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl NotificationDispatcher for CountingDispatcher {
        async fn send(&self, _target: &str, _payload: &NotificationPayload) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(WatchError::Notification("dispatcher down".into()))
            } else {
                Ok(())
            }
        }
    }

    fn fall_snapshot(group: &GroupId, devices: &[&str], target: Option<&str>) -> GroupSnapshot {
        let mut snapshot = GroupSnapshot::empty(group.clone());
        for device in devices {
            snapshot.records.insert(
                DeviceId::new(*device),
                DeviceStatusRecord::incident(DeviceState::Fall, 100, "fall", "help coming", None),
            );
        }
        snapshot.settings = match target {
            Some(t) => GroupSettings::with_target(t).unwrap(),
            None => GroupSettings::unset(),
        };
        snapshot
    }

    fn monitor(dispatcher: Arc<CountingDispatcher>) -> GroupMonitor {
        GroupMonitor::new(
            MonitorConfig::default(),
            GroupId::new("g"),
            Arc::new(MemoryStatusStore::new()),
            dispatcher,
        )
    }

    #[tokio::test]
    async fn test_single_notification_per_window() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let m = monitor(dispatcher.clone());
        let snapshot = fall_snapshot(m.group(), &["a", "b"], Some("x@example.com"));

        // Many rapid snapshots for the same alert: one dispatch.
        for _ in 0..5 {
            m.on_snapshot(&snapshot).await;
        }
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_snapshots_single_winner() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let m = Arc::new(monitor(dispatcher.clone()));
        let snapshot = fall_snapshot(m.group(), &["a", "b", "c"], Some("x@example.com"));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&m);
            let snapshot = snapshot.clone();
            tasks.push(tokio::spawn(async move { m.on_snapshot(&snapshot).await }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_window_reopens_after_cooldown() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let m = monitor(dispatcher.clone());
        let snapshot = fall_snapshot(m.group(), &["a"], Some("x@example.com"));

        m.on_snapshot(&snapshot).await;
        assert_eq!(dispatcher.count(), 1);

        m.rewind_notify_window();
        m.on_snapshot(&snapshot).await;
        assert_eq!(dispatcher.count(), 2);
    }

    #[tokio::test]
    async fn test_no_target_skips_dispatch_only() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let m = monitor(dispatcher.clone());
        let snapshot = fall_snapshot(m.group(), &["a"], None);

        m.on_snapshot(&snapshot).await;
        m.on_snapshot(&snapshot).await;
        assert_eq!(dispatcher.count(), 0);

        // The notification window was never claimed, so configuring a
        // target later dispatches immediately.
        let configured = fall_snapshot(m.group(), &["a"], Some("x@example.com"));
        m.on_snapshot(&configured).await;
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_consumes_window() {
        let dispatcher = Arc::new(CountingDispatcher::failing());
        let m = monitor(dispatcher.clone());
        let snapshot = fall_snapshot(m.group(), &["a"], Some("x@example.com"));

        m.on_snapshot(&snapshot).await;
        m.on_snapshot(&snapshot).await;

        // One attempt; no storm while the dispatcher is failing.
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_all_safe_group_is_quiet() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let m = monitor(dispatcher.clone());

        let mut snapshot = GroupSnapshot::empty(m.group().clone());
        snapshot
            .records
            .insert(DeviceId::new("a"), DeviceStatusRecord::safe(90));
        snapshot.settings = GroupSettings::with_target("x@example.com").unwrap();

        m.on_snapshot(&snapshot).await;
        assert_eq!(dispatcher.count(), 0);
    }

    #[tokio::test]
    async fn test_save_settings_validates_target() {
        let dispatcher = Arc::new(CountingDispatcher::new());
        let store = Arc::new(MemoryStatusStore::new());
        let m = GroupMonitor::new(
            MonitorConfig::default(),
            GroupId::new("g"),
            store.clone(),
            dispatcher,
        );

        assert!(m.save_settings("not-an-address").await.is_err());

        m.save_settings("x@example.com").await.unwrap();
        m.save_settings("x@example.com").await.unwrap();
        let snapshot = store.read_group(&GroupId::new("g")).await.unwrap();
        assert_eq!(snapshot.settings.notify_target.as_deref(), Some("x@example.com"));
    }

    #[test]
    fn test_alert_disposition_branches() {
        assert_eq!(AlertDisposition::of(false, true), AlertDisposition::NoTarget);
        assert_eq!(AlertDisposition::of(false, false), AlertDisposition::NoTarget);
        assert_eq!(
            AlertDisposition::of(true, false),
            AlertDisposition::CoolingDown
        );
        assert_eq!(
            AlertDisposition::of(true, true),
            AlertDisposition::Dispatching
        );
    }

    #[tokio::test]
    async fn test_alert_log_reasons_and_throttle() {
        let (log, _guard) = capture_logs();
        let dispatcher = Arc::new(CountingDispatcher::new());
        let m = monitor(dispatcher.clone());

        // No target: repeated snapshots inside one throttle window
        // produce a single line naming the skip reason.
        let unset = fall_snapshot(m.group(), &["a"], None);
        for _ in 0..3 {
            m.on_snapshot(&unset).await;
        }
        assert_eq!(log.lines_containing("no destination configured"), 1);
        assert_eq!(dispatcher.count(), 0);

        // Target configured while the window is open: dispatch reason.
        m.rewind_log_window();
        let configured = fall_snapshot(m.group(), &["a"], Some("x@example.com"));
        m.on_snapshot(&configured).await;
        assert_eq!(log.lines_containing("dispatching notification"), 1);
        assert_eq!(dispatcher.count(), 1);

        // The window is now consumed: cooldown reason.
        m.rewind_log_window();
        m.on_snapshot(&configured).await;
        assert_eq!(log.lines_containing("waiting out notification cooldown"), 1);
        assert_eq!(dispatcher.count(), 1);
    }
}
