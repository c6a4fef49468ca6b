//! Tails container logs for the deployment's pods.
//!
//! Lines are requested with server-side timestamps; when the leading token
//! parses as RFC 3339 it becomes the entry's timestamp and is stripped from
//! the line, otherwise the sampling time is used. Per-container stream
//! failures are logged and skipped — log collection is never cycle-fatal.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use kube::Client;
use tracing::debug;

use super::deployment::PodContainers;
use crate::model::LogEntry;

pub(crate) struct LogCollector {
    client: Client,
    namespace: String,
    max_lines: usize,
}

impl LogCollector {
    pub fn new(client: Client, namespace: String, max_lines: usize) -> Self {
        Self {
            client,
            namespace,
            max_lines,
        }
    }

    /// Fetches up to `max_lines` tail lines per container.
    pub async fn collect(&self, pods: &[PodContainers]) -> Vec<LogEntry> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let mut entries = Vec::new();
        for pod in pods {
            for container in &pod.containers {
                let params = LogParams {
                    container: Some(container.clone()),
                    tail_lines: Some(self.max_lines as i64),
                    timestamps: true,
                    ..LogParams::default()
                };
                match api.logs(&pod.name, &params).await {
                    Ok(raw) => {
                        let sampled_at = Utc::now();
                        entries.extend(
                            raw.lines()
                                .filter(|line| !line.is_empty())
                                .map(|line| parse_line(sampled_at, &pod.name, container, line)),
                        );
                    }
                    Err(error) => {
                        debug!(pod = %pod.name, %container, %error, "failed to fetch logs");
                    }
                }
            }
        }
        entries
    }
}

/// Splits an optional leading RFC 3339 timestamp off a log line.
fn parse_line(
    sampled_at: DateTime<Utc>,
    pod_name: &str,
    container: &str,
    raw: &str,
) -> LogEntry {
    let (timestamp, line) = match raw.split_once(' ') {
        Some((token, rest)) => match DateTime::parse_from_rfc3339(token) {
            Ok(parsed) => (parsed.with_timezone(&Utc), rest),
            Err(_) => (sampled_at, raw),
        },
        None => (sampled_at, raw),
    };
    LogEntry::new(timestamp, pod_name, container, line)
}
