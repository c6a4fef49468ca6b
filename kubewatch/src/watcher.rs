//! The per-target collection orchestrator.
//!
//! A [`Watcher`] owns one [`Store`] and drives the ordered collection
//! pipeline at a fixed interval: deployment and pods first (cycle-fatal on
//! error), then best-effort enrichment from metrics, events, the HPA, and
//! the optional Prometheus scrape; the snapshot is committed, logs are
//! appended, and the detector's alerts are recorded.
//!
//! There is no retry inside a cycle — the interval is the retry cadence.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::collect::app_metrics::AppMetricsCollector;
use crate::collect::deployment::DeploymentCollector;
use crate::collect::events::EventsCollector;
use crate::collect::hpa::HpaCollector;
use crate::collect::logs::LogCollector;
use crate::collect::pod_metrics::PodMetricsCollector;
use crate::collect::CollectError;
use crate::config::{WatchConfig, WatchTarget};
use crate::detect::detect;
use crate::model::Snapshot;
use crate::recorder::{NoopRecorder, Recorder};
use crate::store::Store;

/// The floor on snapshot retention, applied however short the window is.
const MIN_SNAPSHOTS: usize = 10;

/// Retained log lines, as a multiple of the per-container tail length.
const LOG_RETENTION_FACTOR: usize = 10;

/// Watches a single deployment, collecting into its own store.
pub struct Watcher {
    key: String,
    namespace: String,
    deployment: String,
    interval: Duration,
    store: Arc<Store>,
    recorder: Arc<dyn Recorder>,
    deployments: DeploymentCollector,
    pod_metrics: PodMetricsCollector,
    events: EventsCollector,
    logs: LogCollector,
    hpa: HpaCollector,
    app_metrics: Option<AppMetricsCollector>,
}

impl Watcher {
    /// Builds a watcher for `target`, deriving the store bounds from the
    /// window and interval.
    pub fn new(
        client: Client,
        target: WatchTarget,
        interval: Duration,
        window: Duration,
        max_log_lines: usize,
    ) -> Self {
        let max_snapshots = snapshot_capacity(window, interval);
        let max_logs = max_log_lines * LOG_RETENTION_FACTOR;
        let store = Arc::new(Store::new(window, max_snapshots, max_logs));

        let namespace = target.namespace.clone();
        let deployment = target.deployment.clone();
        let app_metrics = target.metrics_port.map(|port| {
            AppMetricsCollector::new(
                client.clone(),
                namespace.clone(),
                deployment.clone(),
                port,
                // The loader guarantees a path whenever a port is set.
                target.metrics_path.clone().unwrap_or_default(),
                target.metrics_filter.clone(),
            )
        });

        Self {
            key: target.key(),
            namespace: namespace.clone(),
            deployment: deployment.clone(),
            interval,
            store,
            recorder: Arc::new(NoopRecorder),
            deployments: DeploymentCollector::new(
                client.clone(),
                namespace.clone(),
                deployment.clone(),
            ),
            pod_metrics: PodMetricsCollector::new(Some(client.clone()), namespace.clone()),
            events: EventsCollector::new(client.clone(), namespace.clone(), deployment.clone()),
            logs: LogCollector::new(client.clone(), namespace, max_log_lines),
            hpa: HpaCollector::new(client, target.namespace, deployment),
            app_metrics,
        }
    }

    /// Builds a watcher from a single-target configuration.
    pub fn from_config(client: Client, config: &WatchConfig) -> Self {
        let target = WatchTarget::new(config.deployment.clone(), config.namespace.clone());
        Self::new(
            client,
            target,
            config.interval,
            config.window,
            config.max_log_lines,
        )
    }

    /// The `namespace/deployment` key of the watched target.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// A read handle on this watcher's store.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Installs a shared metrics recorder. Call before [`Watcher::run`].
    pub fn set_recorder(&mut self, recorder: Arc<dyn Recorder>) {
        self.recorder = recorder;
    }

    /// Runs one immediate cycle, then ticks at the configured interval until
    /// `shutdown` fires. A cycle in flight when shutdown fires is abandoned;
    /// its work is committed only if the snapshot append already happened.
    pub async fn run(&self, shutdown: drain::Watch) {
        let work = async {
            self.tick().await;
            let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
            // A slow cycle delays the next tick rather than bunching ticks up.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        };
        tokio::select! {
            _ = work => {}
            _ = shutdown.signaled() => {
                debug!(watch = %self.key, "shutdown");
            }
        }
    }

    async fn tick(&self) {
        if let Err(error) = self.cycle().await {
            warn!(watch = %self.key, %error, "collection cycle failed");
            self.recorder.increment_collection_errors(&self.key);
        }
    }

    /// One ordered collection cycle.
    async fn cycle(&self) -> Result<(), CollectError> {
        let started = time::Instant::now();
        let result = self.collect_once().await;
        self.recorder
            .observe_collection_duration(&self.key, started.elapsed().as_secs_f64());
        result
    }

    async fn collect_once(&self) -> Result<(), CollectError> {
        // 1. Deployment and pods; failure aborts the cycle.
        let sample = self.deployments.collect().await?;
        let mut pods = sample.pods;

        // 2. Usage enrichment never fails the cycle.
        self.pod_metrics.enrich(&mut pods).await;

        // 3. Events; proceed empty on failure.
        let pod_names: HashSet<String> =
            sample.containers.iter().map(|p| p.name.clone()).collect();
        let events = match self.events.collect(&pod_names).await {
            Ok(events) => events,
            Err(error) => {
                warn!(watch = %self.key, %error, "failed to collect events");
                Vec::new()
            }
        };

        // 4. HPA and 5. application metrics are optional.
        let hpa = self.hpa.collect().await;
        let app_metrics = match &self.app_metrics {
            Some(collector) => collector.collect().await,
            None => None,
        };

        // 6. Commit the snapshot.
        let snapshot = Snapshot {
            timestamp: sample.sampled_at,
            deployment: sample.deployment,
            pods,
            events,
            hpa,
            app_metrics,
        };
        self.store.add_snapshot(snapshot.clone());

        // 7. Logs are appended separately from the snapshot.
        let logs = self.logs.collect(&sample.containers).await;
        debug!(watch = %self.key, lines = logs.len(), "collected logs");
        self.store.add_logs(logs);

        // 8. Detect anomalies from this snapshot.
        for alert in detect(&snapshot) {
            self.recorder
                .increment_alert(&self.key, alert.severity, alert.kind);
            self.store.add_alert(alert);
        }

        // 9. Gauge updates.
        let deployment = &snapshot.deployment;
        self.recorder.set_pods_ready(
            &self.namespace,
            &self.deployment,
            deployment.ready_replicas as i64,
        );
        self.recorder.set_pods_desired(
            &self.namespace,
            &self.deployment,
            deployment.replicas as i64,
        );
        self.recorder
            .set_snapshots_stored(&self.key, self.store.stats().snapshots as i64);
        self.recorder
            .set_pod_restarts(&self.key, self.store.restart_trend().total as i64);

        Ok(())
    }
}

/// How many snapshots cover the window at the configured interval, floored
/// at [`MIN_SNAPSHOTS`]. Derived from configuration only; actual cycle
/// duration is never measured.
fn snapshot_capacity(window: Duration, interval: Duration) -> usize {
    let per_window = (window.as_millis() / interval.as_millis().max(1)) as usize;
    per_window.saturating_add(1).max(MIN_SNAPSHOTS)
}
