//! The data model shared by collectors, the store, the detector, and the
//! summarizers.
//!
//! Values are plain snapshots of observed cluster state: once constructed they
//! are never mutated, and everything is cheaply cloneable so store readers can
//! hand out owned copies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Substrings that mark a log line as an error, matched case-insensitively.
const ERROR_MARKERS: &[&str] = &["error", "fatal", "panic", "exception", "oomkilled"];

/// One consolidated sample of a watched workload.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// The moment the sample was taken (not any upstream timestamp).
    pub timestamp: DateTime<Utc>,
    pub deployment: DeploymentStatus,
    pub pods: Vec<PodStatus>,
    pub events: Vec<K8sEvent>,
    pub hpa: Option<HpaStatus>,
    pub app_metrics: Option<AppMetrics>,
}

/// Replica counts and conditions of a Deployment, preserved verbatim from the
/// API server (transient anomalies like `ready > desired` are not corrected).
#[derive(Clone, Debug, Default)]
pub struct DeploymentStatus {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    pub available_replicas: i32,
    pub conditions: Vec<String>,
    pub strategy: String,
}

/// The observed state of a single pod.
#[derive(Clone, Debug, Default)]
pub struct PodStatus {
    pub name: String,
    /// Free-form phase string; canonically one of
    /// `Running|Pending|Failed|Succeeded|Unknown`.
    pub phase: String,
    /// True iff every container reports ready.
    pub ready: bool,
    /// Restart count summed across containers.
    pub restart_count: i32,
    pub container_count: i32,
    pub ready_count: i32,
    pub start_time: Option<DateTime<Utc>>,
    /// Conditions with status other than `True`, rendered
    /// `Type=Status (Reason: Message)`.
    pub conditions: Vec<String>,
    /// Human-readable CPU usage (`"45m"`), set by the metrics enricher.
    pub cpu_usage: Option<String>,
    /// Human-readable memory usage (`"120Mi"`), set by the metrics enricher.
    pub memory_usage: Option<String>,
    pub last_terminated: Option<TerminationInfo>,
}

/// The most recent terminated container state found on a pod.
#[derive(Clone, Debug)]
pub struct TerminationInfo {
    pub reason: String,
    pub exit_code: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A normalized Kubernetes event.
#[derive(Clone, Debug)]
pub struct K8sEvent {
    /// Last-seen time, falling back to the event's creation time.
    pub timestamp: DateTime<Utc>,
    /// `Normal` or `Warning`.
    pub type_: String,
    pub reason: String,
    pub message: String,
    /// The involved object as `Kind/Name`.
    pub object: String,
    pub count: i32,
}

/// Autoscaler state for the watched deployment.
#[derive(Clone, Debug)]
pub struct HpaStatus {
    pub name: String,
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub current_replicas: i32,
    pub desired_replicas: i32,
    /// Human-readable renderings of the autoscaler's current metrics.
    pub current_metrics: Vec<String>,
}

/// Application metrics scraped from a pod's Prometheus endpoint, keyed by
/// bare (labels-stripped) metric name.
#[derive(Clone, Debug)]
pub struct AppMetrics {
    pub timestamp: DateTime<Utc>,
    pub values: HashMap<String, f64>,
}

/// A single log line attributed to a pod container.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Parsed from the line's leading timestamp when present; the sampling
    /// time otherwise.
    pub timestamp: DateTime<Utc>,
    pub pod_name: String,
    pub container: String,
    pub line: String,
    pub is_error: bool,
}

impl LogEntry {
    /// Builds a log entry, deriving `is_error` from the line content.
    pub fn new(
        timestamp: DateTime<Utc>,
        pod_name: impl Into<String>,
        container: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        let line = line.into();
        let is_error = is_error_line(&line);
        Self {
            timestamp,
            pod_name: pod_name.into(),
            container: container.into(),
            line,
            is_error,
        }
    }
}

/// Returns true when the line contains any error marker, ignoring case.
pub fn is_error_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// A severity-tagged finding emitted by the detector.
#[derive(Clone, Debug)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub kind: AlertKind,
    pub message: String,
    /// The pod or deployment the alert is about.
    pub object: String,
}

/// Alert severity, ordered from least to most severe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        })
    }
}

/// The closed set of alert types.
///
/// `CrashLoopBackOff` and `ScaleEvent` are not produced by the current rules
/// but remain part of the set so the summarizer renders them if they appear.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AlertKind {
    CrashLoopBackOff,
    OomKilled,
    HighRestartCount,
    PodNotReady,
    ScaleEvent,
    DeploymentFailing,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CrashLoopBackOff => "CrashLoopBackOff",
            Self::OomKilled => "OOMKilled",
            Self::HighRestartCount => "HighRestartCount",
            Self::PodNotReady => "PodNotReady",
            Self::ScaleEvent => "ScaleEvent",
            Self::DeploymentFailing => "DeploymentFailing",
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_markers_are_case_insensitive() {
        assert!(is_error_line("ERROR: connection refused"));
        assert!(is_error_line("task panicked at 'oops'"));
        assert!(is_error_line("container was OOMKilled"));
        assert!(is_error_line("java.lang.NullPointerException thrown"));
        assert!(is_error_line("Fatal: out of disk"));
        assert!(!is_error_line("request served in 12ms"));
    }

    #[test]
    fn log_entry_derives_is_error() {
        let entry = LogEntry::new(Utc::now(), "web-0", "app", "error: boom");
        assert!(entry.is_error);
        let entry = LogEntry::new(Utc::now(), "web-0", "app", "all good");
        assert!(!entry.is_error);
    }
}
