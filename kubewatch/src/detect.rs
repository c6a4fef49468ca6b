//! Stateless anomaly rules evaluated against a single snapshot.

use crate::model::{Alert, AlertKind, Severity, Snapshot};

/// The restart count above which a pod is considered to be crash-looping.
const RESTART_THRESHOLD: i32 = 5;

/// Evaluates every rule against `snapshot`, returning zero or more alerts.
///
/// Each rule is checked independently against every pod, plus once against
/// the deployment, and emits at most one alert per match. Alerts are stamped
/// with the snapshot's sample time.
pub fn detect(snapshot: &Snapshot) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let at = snapshot.timestamp;

    for pod in &snapshot.pods {
        if pod.restart_count > RESTART_THRESHOLD {
            alerts.push(Alert {
                timestamp: at,
                severity: Severity::Critical,
                kind: AlertKind::HighRestartCount,
                message: format!("Pod {} has {} restarts", pod.name, pod.restart_count),
                object: pod.name.clone(),
            });
        }

        if let Some(term) = &pod.last_terminated {
            if term.reason == "OOMKilled" {
                alerts.push(Alert {
                    timestamp: at,
                    severity: Severity::Critical,
                    kind: AlertKind::OomKilled,
                    message: format!(
                        "Pod {} was OOMKilled (exit code {})",
                        pod.name, term.exit_code
                    ),
                    object: pod.name.clone(),
                });
            }
        }

        if !pod.ready && pod.phase == "Running" {
            alerts.push(Alert {
                timestamp: at,
                severity: Severity::Warning,
                kind: AlertKind::PodNotReady,
                message: format!(
                    "Pod {} is running but not ready ({}/{} containers)",
                    pod.name, pod.ready_count, pod.container_count
                ),
                object: pod.name.clone(),
            });
        }
    }

    let deployment = &snapshot.deployment;
    if deployment.ready_replicas < deployment.replicas {
        alerts.push(Alert {
            timestamp: at,
            severity: Severity::Warning,
            kind: AlertKind::DeploymentFailing,
            message: format!(
                "Deployment {} has {}/{} replicas ready",
                deployment.name, deployment.ready_replicas, deployment.replicas
            ),
            object: deployment.name.clone(),
        });
    }

    alerts
}
