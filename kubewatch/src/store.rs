//! Bounded, time-windowed retention of observability data for one target.
//!
//! A [`Store`] holds three independent streams: snapshots, log lines, and
//! alerts. Snapshots and logs are bounded by count; alerts are pruned by age
//! on every write. The window additionally governs the *visibility* of
//! snapshots and alerts through the read methods.
//!
//! Writes are serialized per stream with a [`parking_lot::RwLock`]; any
//! number of readers may run concurrently and every read method returns
//! owned copies, never aliases into the internal buffers.
//!
//! Entries are stamped with a monotonic [`Instant`] on insertion so that
//! eviction and window visibility are immune to wall-clock jumps; the
//! wall-clock timestamps carried by the data model are used for rendering
//! only.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::model::{Alert, LogEntry, Snapshot};

/// Thread-safe bounded retention for one watched target.
#[derive(Debug)]
pub struct Store {
    window: Duration,
    max_snapshots: usize,
    max_logs: usize,
    snapshots: RwLock<VecDeque<Stamped<Snapshot>>>,
    logs: RwLock<VecDeque<LogEntry>>,
    alerts: RwLock<Vec<Stamped<Alert>>>,
}

/// An entry paired with its monotonic insertion time.
#[derive(Debug)]
struct Stamped<T> {
    at: Instant,
    item: T,
}

/// Current stream sizes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub snapshots: usize,
    pub logs: usize,
    pub alerts: usize,
}

/// Restart counts derived from the retained snapshot sequence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RestartTrend {
    /// Restarts summed across pods of the latest snapshot.
    pub total: i32,
    /// Restarts accrued between the oldest retained snapshot and the latest;
    /// zero unless at least two snapshots are retained.
    pub in_window: i32,
}

impl Store {
    /// Creates a store retaining up to `max_snapshots` snapshots, `max_logs`
    /// log lines, and `window`-aged alerts.
    pub fn new(window: Duration, max_snapshots: usize, max_logs: usize) -> Self {
        Self {
            window,
            max_snapshots,
            max_logs,
            snapshots: RwLock::new(VecDeque::with_capacity(max_snapshots)),
            logs: RwLock::new(VecDeque::new()),
            alerts: RwLock::new(Vec::new()),
        }
    }

    /// The retention/visibility window.
    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    pub fn max_logs(&self) -> usize {
        self.max_logs
    }

    /// Appends a snapshot, dropping the oldest once the capacity is reached.
    pub fn add_snapshot(&self, snapshot: Snapshot) {
        let mut snapshots = self.snapshots.write();
        snapshots.push_back(Stamped {
            at: Instant::now(),
            item: snapshot,
        });
        while snapshots.len() > self.max_snapshots {
            snapshots.pop_front();
        }
    }

    /// Appends log entries in order, truncating from the head so that at most
    /// `max_logs` remain.
    pub fn add_logs(&self, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }
        let mut logs = self.logs.write();
        logs.extend(entries);
        while logs.len() > self.max_logs {
            logs.pop_front();
        }
    }

    /// Appends an alert, then prunes the alert stream to the window.
    pub fn add_alert(&self, alert: Alert) {
        let now = Instant::now();
        let mut alerts = self.alerts.write();
        alerts.push(Stamped {
            at: now,
            item: alert,
        });
        let window = self.window;
        alerts.retain(|entry| now.saturating_duration_since(entry.at) < window);
    }

    /// The most recent snapshot, if any.
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.snapshots.read().back().map(|entry| entry.item.clone())
    }

    /// Retained snapshots no older than the window, oldest first.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let now = Instant::now();
        self.snapshots
            .read()
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.at) < self.window)
            .map(|entry| entry.item.clone())
            .collect()
    }

    /// Alerts no older than the window, oldest first.
    pub fn alerts(&self) -> Vec<Alert> {
        let now = Instant::now();
        self.alerts
            .read()
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.at) < self.window)
            .map(|entry| entry.item.clone())
            .collect()
    }

    /// The last `max` log entries in chronological order. Logs are capped
    /// structurally, not temporally, so no window filter applies.
    pub fn recent_logs(&self, max: usize) -> Vec<LogEntry> {
        let logs = self.logs.read();
        let skip = logs.len().saturating_sub(max);
        logs.iter().skip(skip).cloned().collect()
    }

    /// Up to `max` of the most recent error entries, in chronological order.
    pub fn error_logs(&self, max: usize) -> Vec<LogEntry> {
        let logs = self.logs.read();
        let mut errors: Vec<LogEntry> = logs
            .iter()
            .rev()
            .filter(|entry| entry.is_error)
            .take(max)
            .cloned()
            .collect();
        errors.reverse();
        errors
    }

    /// Whether any retained error entry falls inside the window, judged by
    /// the entry's wall-clock timestamp (log lines may carry historical
    /// timestamps parsed from their content).
    pub fn has_recent_errors(&self) -> bool {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::zero());
        self.logs
            .read()
            .iter()
            .any(|entry| entry.is_error && entry.timestamp > cutoff)
    }

    /// Restart totals derived from the retained snapshots, without
    /// interpolation.
    pub fn restart_trend(&self) -> RestartTrend {
        let snapshots = self.snapshots.read();
        let Some(latest) = snapshots.back() else {
            return RestartTrend::default();
        };
        let total = pod_restarts(&latest.item);
        let in_window = if snapshots.len() >= 2 {
            let oldest = snapshots.front().expect("non-empty deque has a front");
            total - pod_restarts(&oldest.item)
        } else {
            0
        };
        RestartTrend { total, in_window }
    }

    /// Current stream sizes.
    pub fn stats(&self) -> Stats {
        Stats {
            snapshots: self.snapshots.read().len(),
            logs: self.logs.read().len(),
            alerts: self.alerts.read().len(),
        }
    }
}

fn pod_restarts(snapshot: &Snapshot) -> i32 {
    snapshot.pods.iter().map(|pod| pod.restart_count).sum()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{AlertKind, DeploymentStatus, PodStatus, Severity};
    use proptest::prelude::*;
    use std::time::Duration;

    const WINDOW: Duration = Duration::from_secs(3600);

    fn snapshot(restarts: &[i32]) -> Snapshot {
        Snapshot {
            timestamp: Utc::now(),
            deployment: DeploymentStatus::default(),
            pods: restarts
                .iter()
                .map(|&restart_count| PodStatus {
                    restart_count,
                    ..PodStatus::default()
                })
                .collect(),
            events: Vec::new(),
            hpa: None,
            app_metrics: None,
        }
    }

    fn log(line: &str) -> LogEntry {
        LogEntry::new(Utc::now(), "pod-0", "app", line)
    }

    fn alert() -> Alert {
        Alert {
            timestamp: Utc::now(),
            severity: Severity::Warning,
            kind: AlertKind::PodNotReady,
            message: "pod-0 is not ready".into(),
            object: "pod-0".into(),
        }
    }

    #[test]
    fn snapshots_are_capped() {
        let store = Store::new(WINDOW, 3, 10);
        for i in 0..5 {
            store.add_snapshot(snapshot(&[i]));
        }
        assert_eq!(store.stats().snapshots, 3);
        let latest = store.latest_snapshot().expect("non-empty");
        assert_eq!(latest.pods[0].restart_count, 4);
    }

    #[test]
    fn logs_keep_the_tail() {
        let store = Store::new(WINDOW, 3, 4);
        store.add_logs((0..6).map(|i| log(&format!("line {i}"))).collect());
        let kept = store.recent_logs(10);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].line, "line 2");
        assert_eq!(kept[3].line, "line 5");
    }

    #[test]
    fn recent_logs_limits_from_the_tail() {
        let store = Store::new(WINDOW, 3, 100);
        store.add_logs((0..6).map(|i| log(&format!("line {i}"))).collect());
        let kept = store.recent_logs(2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].line, "line 4");
        assert_eq!(kept[1].line, "line 5");
    }

    #[test]
    fn error_logs_are_chronological_and_bounded() {
        let store = Store::new(WINDOW, 3, 100);
        store.add_logs(vec![
            log("error: one"),
            log("ok"),
            log("error: two"),
            log("error: three"),
            log("ok again"),
        ]);
        let errors = store.error_logs(2);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, "error: two");
        assert_eq!(errors[1].line, "error: three");
    }

    #[test]
    fn restart_trend_requires_two_snapshots() {
        let store = Store::new(WINDOW, 10, 10);
        assert_eq!(store.restart_trend(), RestartTrend::default());

        store.add_snapshot(snapshot(&[3, 3]));
        assert_eq!(
            store.restart_trend(),
            RestartTrend {
                total: 6,
                in_window: 0
            }
        );

        store.add_snapshot(snapshot(&[5, 5]));
        assert_eq!(
            store.restart_trend(),
            RestartTrend {
                total: 10,
                in_window: 4
            }
        );
    }

    #[test]
    fn restart_trend_uses_oldest_retained() {
        let store = Store::new(WINDOW, 2, 10);
        store.add_snapshot(snapshot(&[1]));
        store.add_snapshot(snapshot(&[4]));
        store.add_snapshot(snapshot(&[9]));
        // The first snapshot was evicted; the delta is against the second.
        assert_eq!(
            store.restart_trend(),
            RestartTrend {
                total: 9,
                in_window: 5
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_are_pruned_by_age() {
        let store = Store::new(Duration::from_secs(60), 10, 10);
        store.add_alert(alert());
        assert_eq!(store.alerts().len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        // The stale alert is invisible to readers and pruned on write.
        assert!(store.alerts().is_empty());
        store.add_alert(alert());
        assert_eq!(store.stats().alerts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_window_governs_visibility_not_retention() {
        let store = Store::new(Duration::from_secs(60), 10, 10);
        store.add_snapshot(snapshot(&[1]));
        tokio::time::advance(Duration::from_secs(120)).await;
        store.add_snapshot(snapshot(&[2]));

        // Both retained, one visible.
        assert_eq!(store.stats().snapshots, 2);
        let visible = store.snapshots();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].pods[0].restart_count, 2);
    }

    proptest! {
        #[test]
        fn snapshot_count_is_min_of_inserted_and_cap(
            inserted in 0usize..40,
            cap in 1usize..12,
        ) {
            let store = Store::new(WINDOW, cap, 10);
            for i in 0..inserted {
                store.add_snapshot(snapshot(&[i as i32]));
            }
            prop_assert_eq!(store.stats().snapshots, inserted.min(cap));
            if inserted > 0 {
                let latest = store.latest_snapshot().expect("non-empty");
                prop_assert_eq!(latest.pods[0].restart_count, inserted as i32 - 1);
            }
        }

        #[test]
        fn logs_retain_the_insertion_order_tail(
            batches in proptest::collection::vec(0usize..8, 0..8),
            cap in 1usize..16,
        ) {
            let store = Store::new(WINDOW, 4, cap);
            let mut all = Vec::new();
            let mut counter = 0usize;
            for batch in batches {
                let entries: Vec<LogEntry> = (0..batch)
                    .map(|_| {
                        let entry = log(&format!("line {counter}"));
                        counter += 1;
                        entry
                    })
                    .collect();
                all.extend(entries.iter().map(|e| e.line.clone()));
                store.add_logs(entries);
            }
            let kept: Vec<String> = store
                .recent_logs(usize::MAX)
                .into_iter()
                .map(|e| e.line)
                .collect();
            prop_assert_eq!(kept.len(), all.len().min(cap));
            let tail: Vec<String> = all[all.len() - kept.len()..].to_vec();
            prop_assert_eq!(kept, tail);
        }

        #[test]
        fn error_logs_are_a_chronological_subset(
            flags in proptest::collection::vec(any::<bool>(), 0..30),
            max in 0usize..10,
        ) {
            let store = Store::new(WINDOW, 4, 100);
            let entries: Vec<LogEntry> = flags
                .iter()
                .enumerate()
                .map(|(i, &is_err)| {
                    log(&if is_err {
                        format!("error {i}")
                    } else {
                        format!("fine {i}")
                    })
                })
                .collect();
            store.add_logs(entries);
            let errors = store.error_logs(max);
            prop_assert!(errors.len() <= max);
            prop_assert!(errors.iter().all(|e| e.is_error));
            let times: Vec<_> = errors.iter().map(|e| e.timestamp).collect();
            prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
