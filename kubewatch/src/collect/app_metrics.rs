//! Scrapes a target's Prometheus endpoint through the first running pod.
//!
//! The scrape is strictly best-effort: any failure along the way — lookup,
//! transport, a non-200 status, an empty result — yields "absent" rather
//! than an error, so a flapping exporter never poisons a collection cycle.

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::debug;

use super::selector_string;
use crate::model::AppMetrics;
use crate::promtext;

/// How long one scrape may take end to end.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct AppMetricsCollector {
    client: Client,
    http: Option<reqwest::Client>,
    namespace: String,
    deployment: String,
    port: u16,
    path: String,
    filters: Vec<String>,
}

impl AppMetricsCollector {
    pub fn new(
        client: Client,
        namespace: String,
        deployment: String,
        port: u16,
        path: String,
        filters: Vec<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .build()
            .map_err(|error| debug!(%error, "failed to build scrape client"))
            .ok();
        Self {
            client,
            http,
            namespace,
            deployment,
            port,
            path,
            filters,
        }
    }

    /// Scrapes the first running pod with an IP, returning parsed and
    /// filtered metrics, or `None`.
    pub async fn collect(&self) -> Option<AppMetrics> {
        let http = self.http.as_ref()?;

        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &self.namespace);
        let deployment = deployments.get(&self.deployment).await.ok()?;
        let selector = selector_string(&deployment.spec?.selector)?;

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = pods
            .list(&ListParams::default().labels(&selector))
            .await
            .ok()?;
        let ip = list.items.iter().find_map(|pod| {
            let status = pod.status.as_ref()?;
            if status.phase.as_deref() != Some("Running") {
                return None;
            }
            status.pod_ip.clone().filter(|ip| !ip.is_empty())
        })?;

        let url = format!("http://{}:{}{}", ip, self.port, self.path);
        let response = match http.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!(%url, %error, "metrics scrape failed");
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            debug!(%url, status = %response.status(), "metrics scrape rejected");
            return None;
        }
        let body = response.text().await.ok()?;

        let values = promtext::parse(&body, &self.filters);
        if values.is_empty() {
            return None;
        }
        Some(AppMetrics {
            timestamp: Utc::now(),
            values,
        })
    }
}
