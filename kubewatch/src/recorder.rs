//! The metrics interface the watcher reports into.
//!
//! The core depends only on this trait; the `kubewatch-prometheus` crate
//! provides a `prometheus-client` backed implementation.

use crate::model::{AlertKind, Severity};

/// Receives operational metrics from every watcher. Implementations must be
/// safe to call from any watcher task.
pub trait Recorder: Send + Sync {
    /// Records how long one collection cycle took.
    fn observe_collection_duration(&self, target: &str, seconds: f64);

    /// Counts a failed collection cycle.
    fn increment_collection_errors(&self, target: &str);

    /// Counts an alert emitted by the detector.
    fn increment_alert(&self, target: &str, severity: Severity, kind: AlertKind);

    /// Reports the ready replica count of the watched deployment.
    fn set_pods_ready(&self, namespace: &str, deployment: &str, count: i64);

    /// Reports the desired replica count of the watched deployment.
    fn set_pods_desired(&self, namespace: &str, deployment: &str, count: i64);

    /// Reports how many snapshots the target's store retains.
    fn set_snapshots_stored(&self, target: &str, count: i64);

    /// Reports the restart total observed in the latest snapshot.
    fn set_pod_restarts(&self, target: &str, count: i64);
}

/// A recorder that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn observe_collection_duration(&self, _target: &str, _seconds: f64) {}
    fn increment_collection_errors(&self, _target: &str) {}
    fn increment_alert(&self, _target: &str, _severity: Severity, _kind: AlertKind) {}
    fn set_pods_ready(&self, _namespace: &str, _deployment: &str, _count: i64) {}
    fn set_pods_desired(&self, _namespace: &str, _deployment: &str, _count: i64) {}
    fn set_snapshots_stored(&self, _target: &str, _count: i64) {}
    fn set_pod_restarts(&self, _target: &str, _count: i64) {}
}
