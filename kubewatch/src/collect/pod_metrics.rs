//! Enriches pod statuses with CPU/memory usage from the `metrics.k8s.io`
//! API.
//!
//! The metrics API is an aggregated resource without typed bindings, so the
//! collector issues a raw request through the shared client and decodes the
//! response itself. Absence of a metrics server is tolerated: failures are
//! logged at debug and the pods pass through unchanged.

use kube::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::PodStatus;

pub(crate) struct PodMetricsCollector {
    client: Option<Client>,
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct PodMetricsList {
    items: Vec<PodMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct PodMetricsItem {
    metadata: PodMetricsMeta,
    containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Deserialize)]
struct PodMetricsMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContainerMetrics {
    usage: ResourceUsage,
}

#[derive(Debug, Deserialize)]
struct ResourceUsage {
    cpu: String,
    memory: String,
}

impl PodMetricsCollector {
    /// A collector without a client performs no enrichment.
    pub fn new(client: Option<Client>, namespace: String) -> Self {
        Self { client, namespace }
    }

    /// Sets `cpu_usage`/`memory_usage` on every pod the metrics API reports.
    /// Never fails the cycle.
    pub async fn enrich(&self, pods: &mut [PodStatus]) {
        let Some(client) = &self.client else {
            return;
        };

        let path = format!(
            "/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods",
            self.namespace
        );
        let request = match http::Request::builder()
            .method("GET")
            .uri(&path)
            .body(Vec::new())
        {
            Ok(request) => request,
            Err(error) => {
                debug!(%error, "failed to build pod metrics request");
                return;
            }
        };

        let list = match client.request::<PodMetricsList>(request).await {
            Ok(list) => list,
            Err(error) => {
                debug!(namespace = %self.namespace, %error, "pod metrics unavailable");
                return;
            }
        };

        for item in list.items {
            let Some(pod) = pods.iter_mut().find(|p| p.name == item.metadata.name) else {
                continue;
            };
            let millicores: u64 = item
                .containers
                .iter()
                .map(|c| parse_cpu_millicores(&c.usage.cpu))
                .sum();
            let bytes: u64 = item
                .containers
                .iter()
                .map(|c| parse_memory_bytes(&c.usage.memory))
                .sum();
            pod.cpu_usage = Some(format!("{millicores}m"));
            pod.memory_usage = Some(format!("{}Mi", bytes / (1024 * 1024)));
        }
    }
}

/// Parses a CPU quantity (`"100m"`, `"1"`, `"500000000n"`) into millicores.
fn parse_cpu_millicores(quantity: &str) -> u64 {
    let quantity = quantity.trim();
    if let Some(nanos) = quantity.strip_suffix('n') {
        nanos.parse::<u64>().map(|n| n / 1_000_000).unwrap_or(0)
    } else if let Some(micros) = quantity.strip_suffix('u') {
        micros.parse::<u64>().map(|u| u / 1_000).unwrap_or(0)
    } else if let Some(millis) = quantity.strip_suffix('m') {
        millis.parse::<u64>().unwrap_or(0)
    } else {
        quantity
            .parse::<f64>()
            .map(|cores| (cores * 1000.0) as u64)
            .unwrap_or(0)
    }
}

/// Parses a memory quantity (`"128Mi"`, `"256000Ki"`, plain bytes) into
/// bytes.
fn parse_memory_bytes(quantity: &str) -> u64 {
    const BINARY: &[(&str, u64)] = &[
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
    ];
    const DECIMAL: &[(&str, u64)] = &[
        ("k", 1_000),
        ("K", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
    ];

    let quantity = quantity.trim();
    for (suffix, scale) in BINARY {
        if let Some(value) = quantity.strip_suffix(suffix) {
            return value.parse::<u64>().map(|v| v * scale).unwrap_or(0);
        }
    }
    for (suffix, scale) in DECIMAL {
        if let Some(value) = quantity.strip_suffix(suffix) {
            return value.parse::<u64>().map(|v| v * scale).unwrap_or(0);
        }
    }
    quantity.parse::<u64>().unwrap_or(0)
}
