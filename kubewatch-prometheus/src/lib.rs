//! A `prometheus-client` backed [`Recorder`] for kubewatch.
//!
//! Registers the watcher's operational metrics on a caller-provided
//! registry. Note that no prefix is added; callers typically register on a
//! sub-registry:
//!
//! ```
//! let mut prom = prometheus_client::registry::Registry::default();
//! let recorder =
//!     kubewatch_prometheus::PrometheusRecorder::register(prom.sub_registry_with_prefix("kubewatch"));
//! ```

#![deny(rust_2018_idioms, missing_docs)]
#![forbid(unsafe_code)]

use kubewatch::model::{AlertKind, Severity};
use kubewatch::Recorder;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::{Registry, Unit};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TargetLabels {
    target: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct AlertLabels {
    target: String,
    severity: String,
    alert_type: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct WorkloadLabels {
    namespace: String,
    deployment: String,
}

/// Exposes watcher metrics through a `prometheus-client` registry.
#[derive(Clone, Debug)]
pub struct PrometheusRecorder {
    collection_duration: Family<TargetLabels, Histogram>,
    collection_errors: Family<TargetLabels, Counter>,
    alerts: Family<AlertLabels, Counter>,
    pods_ready: Family<WorkloadLabels, Gauge>,
    pods_desired: Family<WorkloadLabels, Gauge>,
    snapshots_stored: Family<TargetLabels, Gauge>,
    pod_restarts: Family<TargetLabels, Gauge>,
}

fn duration_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.01, 2.0, 12))
}

impl PrometheusRecorder {
    /// Registers all watcher metrics with the given registry.
    pub fn register(reg: &mut Registry) -> Self {
        let collection_duration =
            Family::<TargetLabels, Histogram>::new_with_constructor(duration_histogram);
        reg.register_with_unit(
            "collection_duration",
            "Duration of one collection cycle",
            Unit::Seconds,
            collection_duration.clone(),
        );

        let collection_errors = Family::<TargetLabels, Counter>::default();
        reg.register(
            "collection_errors",
            "Number of failed collection cycles",
            collection_errors.clone(),
        );

        let alerts = Family::<AlertLabels, Counter>::default();
        reg.register(
            "alerts",
            "Number of alerts emitted by the anomaly detector",
            alerts.clone(),
        );

        let pods_ready = Family::<WorkloadLabels, Gauge>::default();
        reg.register(
            "pods_ready",
            "Ready replicas of the watched deployment",
            pods_ready.clone(),
        );

        let pods_desired = Family::<WorkloadLabels, Gauge>::default();
        reg.register(
            "pods_desired",
            "Desired replicas of the watched deployment",
            pods_desired.clone(),
        );

        let snapshots_stored = Family::<TargetLabels, Gauge>::default();
        reg.register(
            "snapshots_stored",
            "Snapshots retained in the target's store",
            snapshots_stored.clone(),
        );

        let pod_restarts = Family::<TargetLabels, Gauge>::default();
        reg.register(
            "pod_restarts",
            "Container restarts observed in the latest snapshot",
            pod_restarts.clone(),
        );

        Self {
            collection_duration,
            collection_errors,
            alerts,
            pods_ready,
            pods_desired,
            snapshots_stored,
            pod_restarts,
        }
    }

    fn target(target: &str) -> TargetLabels {
        TargetLabels {
            target: target.to_string(),
        }
    }

    fn workload(namespace: &str, deployment: &str) -> WorkloadLabels {
        WorkloadLabels {
            namespace: namespace.to_string(),
            deployment: deployment.to_string(),
        }
    }
}

impl Recorder for PrometheusRecorder {
    fn observe_collection_duration(&self, target: &str, seconds: f64) {
        self.collection_duration
            .get_or_create(&Self::target(target))
            .observe(seconds);
    }

    fn increment_collection_errors(&self, target: &str) {
        self.collection_errors
            .get_or_create(&Self::target(target))
            .inc();
    }

    fn increment_alert(&self, target: &str, severity: Severity, kind: AlertKind) {
        self.alerts
            .get_or_create(&AlertLabels {
                target: target.to_string(),
                severity: severity.to_string(),
                alert_type: kind.to_string(),
            })
            .inc();
    }

    fn set_pods_ready(&self, namespace: &str, deployment: &str, count: i64) {
        self.pods_ready
            .get_or_create(&Self::workload(namespace, deployment))
            .set(count);
    }

    fn set_pods_desired(&self, namespace: &str, deployment: &str, count: i64) {
        self.pods_desired
            .get_or_create(&Self::workload(namespace, deployment))
            .set(count);
    }

    fn set_snapshots_stored(&self, target: &str, count: i64) {
        self.snapshots_stored
            .get_or_create(&Self::target(target))
            .set(count);
    }

    fn set_pod_restarts(&self, target: &str, count: i64) {
        self.pod_restarts
            .get_or_create(&Self::target(target))
            .set(count);
    }
}
