//! Fans one watcher out per configured target over a shared client.

use std::collections::HashMap;
use std::sync::Arc;

use kube::Client;
use tokio::task::JoinSet;
use tracing::info;

use crate::config::MultiWatchConfig;
use crate::recorder::Recorder;
use crate::store::Store;
use crate::watcher::Watcher;

/// Owns one [`Watcher`] (and thus one [`Store`]) per target. All watchers
/// share a single Kubernetes client; the cluster is trusted to rate-limit.
pub struct MultiWatcher {
    watchers: Vec<Watcher>,
    stores: HashMap<String, Arc<Store>>,
}

impl MultiWatcher {
    /// Builds a watcher per target from a validated configuration.
    pub fn new(client: Client, config: &MultiWatchConfig) -> Self {
        let mut watchers = Vec::with_capacity(config.targets.len());
        let mut stores = HashMap::with_capacity(config.targets.len());
        for target in &config.targets {
            let watcher = Watcher::new(
                client.clone(),
                target.clone(),
                config.interval,
                config.window,
                config.max_log_lines,
            );
            stores.insert(watcher.key().to_string(), watcher.store());
            watchers.push(watcher);
        }
        Self { watchers, stores }
    }

    /// Installs a shared metrics recorder on every watcher. Call before
    /// [`MultiWatcher::run`].
    pub fn set_metrics(&mut self, recorder: Arc<dyn Recorder>) {
        for watcher in &mut self.watchers {
            watcher.set_recorder(recorder.clone());
        }
    }

    /// A snapshot of the target-key-to-store mapping, for read-only use by
    /// the summarizers.
    pub fn stores(&self) -> HashMap<String, Arc<Store>> {
        self.stores.clone()
    }

    /// Runs every watcher concurrently until `shutdown` fires, then waits
    /// for all of them to exit.
    pub async fn run(self, shutdown: drain::Watch) {
        info!(targets = self.watchers.len(), "starting watchers");
        let mut tasks = JoinSet::new();
        for watcher in self.watchers {
            let shutdown = shutdown.clone();
            tasks.spawn(async move { watcher.run(shutdown).await });
        }
        drop(shutdown);
        while tasks.join_next().await.is_some() {}
    }
}
