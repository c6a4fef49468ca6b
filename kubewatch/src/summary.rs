//! Renders one target's store into the fixed-shape context block and the
//! one-line status summary consumed by the host CLI.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::Severity;
use crate::store::Store;

mod multi;

pub use multi::{render_multi_context, render_multi_status, NO_TARGETS};

/// The placeholder emitted while a store is still empty.
pub const NO_DATA: &str = "[K8s Watcher: No data collected yet]";

/// How many events the context block lists.
const MAX_EVENTS: usize = 10;

/// How many error log lines the context block lists.
const MAX_ERROR_LOGS: usize = 10;

/// Renders the latest snapshot (plus window derivatives) of `store` into the
/// full context block.
pub fn render_context(store: &Store) -> String {
    let Some(snapshot) = store.latest_snapshot() else {
        return NO_DATA.to_string();
    };
    let mut out = String::new();

    let deployment = &snapshot.deployment;
    let _ = writeln!(
        out,
        "[K8s Context: deployment/{} in namespace/{}]",
        deployment.name, deployment.namespace
    );
    let _ = writeln!(out, "Collected at: {}", rfc3339(snapshot.timestamp));

    let _ = writeln!(out, "\n## Deployment Status");
    let _ = writeln!(
        out,
        "Replicas: {}/{} ready, {} updated, {} available",
        deployment.ready_replicas,
        deployment.replicas,
        deployment.updated_replicas,
        deployment.available_replicas
    );
    let _ = writeln!(out, "Strategy: {}", deployment.strategy);
    if !deployment.conditions.is_empty() {
        let _ = writeln!(out, "Conditions:");
        for condition in &deployment.conditions {
            let _ = writeln!(out, "  - {condition}");
        }
    }

    let trend = store.restart_trend();
    let _ = writeln!(out, "\n## Pods ({} total)", snapshot.pods.len());
    let _ = writeln!(
        out,
        "Total restarts: {} (delta in window: {})",
        trend.total, trend.in_window
    );
    for pod in &snapshot.pods {
        let readiness = if pod.ready { "Ready" } else { "NOT READY" };
        let _ = write!(
            out,
            "- {}: {} {} restarts={}",
            pod.name, pod.phase, readiness, pod.restart_count
        );
        if let Some(cpu) = &pod.cpu_usage {
            let _ = write!(out, " cpu={cpu}");
        }
        if let Some(memory) = &pod.memory_usage {
            let _ = write!(out, " mem={memory}");
        }
        out.push('\n');
        if let Some(term) = &pod.last_terminated {
            let at = term
                .ended_at
                .or(term.started_at)
                .map(rfc3339)
                .unwrap_or_else(|| "unknown".to_string());
            let _ = writeln!(
                out,
                "  Last terminated: {} (exit code {}) at {}",
                term.reason, term.exit_code, at
            );
        }
        for condition in &pod.conditions {
            let _ = writeln!(out, "  Condition: {condition}");
        }
    }

    if let Some(hpa) = &snapshot.hpa {
        let _ = writeln!(out, "\n## HPA ({})", hpa.name);
        let _ = writeln!(
            out,
            "Replicas: min={} max={} current={} desired={}",
            hpa.min_replicas, hpa.max_replicas, hpa.current_replicas, hpa.desired_replicas
        );
        for metric in &hpa.current_metrics {
            let _ = writeln!(out, "- {metric}");
        }
    }

    let skip = snapshot.events.len().saturating_sub(MAX_EVENTS);
    let recent = &snapshot.events[skip..];
    let _ = writeln!(out, "\n## Recent Events ({})", recent.len());
    let now = Utc::now();
    for event in recent {
        let age = format_duration((now - event.timestamp).num_seconds());
        let _ = writeln!(
            out,
            "[{}] {} {}: {} ({} ago)",
            event.type_, event.object, event.reason, event.message, age
        );
    }

    let alerts = store.alerts();
    if alerts.is_empty() {
        let _ = writeln!(out, "\n## Alerts: None active");
    } else {
        let _ = writeln!(out, "\n## Active Alerts ({})", alerts.len());
        for alert in &alerts {
            let _ = writeln!(
                out,
                "[{}] {}: {} ({})",
                alert.severity, alert.kind, alert.message, alert.object
            );
        }
    }

    if let Some(metrics) = &snapshot.app_metrics {
        let _ = writeln!(out, "\n## Application Metrics ({})", metrics.values.len());
        let mut names: Vec<&String> = metrics.values.keys().collect();
        names.sort();
        for name in names {
            let _ = writeln!(out, "{}: {}", name, format_value(metrics.values[name]));
        }
    }

    let errors = store.error_logs(MAX_ERROR_LOGS);
    if errors.is_empty() {
        let _ = writeln!(out, "\n## Error Logs: None");
    } else {
        let _ = writeln!(out, "\n## Recent Error Logs ({})", errors.len());
        for entry in &errors {
            let _ = writeln!(
                out,
                "[{}] {}/{}: {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.pod_name,
                entry.container,
                entry.line
            );
        }
    }

    out
}

/// Renders the compact one-line status of `store`.
pub fn render_status(store: &Store) -> String {
    let Some(snapshot) = store.latest_snapshot() else {
        return NO_DATA.to_string();
    };
    let deployment = &snapshot.deployment;
    let alerts = store.alerts();
    let health = if alerts.iter().any(|a| a.severity == Severity::Critical) {
        "critical"
    } else if deployment.ready_replicas < deployment.replicas || !alerts.is_empty() {
        "degraded"
    } else {
        "healthy"
    };
    format!(
        "{}/{}: {}/{} pods ready | {} | {} alerts | {} snapshots collected",
        deployment.namespace,
        deployment.name,
        deployment.ready_replicas,
        deployment.replicas,
        health,
        alerts.len(),
        store.stats().snapshots
    )
}

fn rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders a second count in compound units (`"1h2m3s"`, `"45s"`).
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Formats a metric value with four significant digits, switching to
/// scientific notation outside the comfortable fixed-point range.
fn format_value(value: f64) -> String {
    const DIGITS: i32 = 4;
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= DIGITS {
        return format!("{:.*e}", (DIGITS - 1) as usize, value);
    }
    let decimals = (DIGITS - 1 - exponent).max(0) as usize;
    let fixed = format!("{value:.decimals$}");
    if fixed.contains('.') {
        fixed
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        fixed
    }
}


#[cfg(test)]
mod test {
    use super::testutil::*;
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_store_yields_the_placeholder() {
        let store = Store::new(Duration::from_secs(3600), 10, 100);
        assert_eq!(render_context(&store), NO_DATA);
        assert_eq!(render_status(&store), NO_DATA);
    }

    #[test]
    fn healthy_target_status_line() {
        let store = healthy_store("web");
        let status = render_status(&store);
        assert!(status.contains("3/3 pods ready"), "{status}");
        assert!(status.contains("healthy"), "{status}");
        assert!(status.contains("0 alerts"), "{status}");
        assert!(status.contains("1 snapshots collected"), "{status}");
    }

    #[test]
    fn degraded_target_status_line() {
        let store = degraded_store("web");
        let status = render_status(&store);
        assert!(status.contains("2/3 pods ready"), "{status}");
        assert!(status.contains("degraded"), "{status}");
    }

    #[test]
    fn critical_dominates_degraded() {
        let store = critical_store("web");
        let status = render_status(&store);
        assert!(status.contains("critical"), "{status}");
    }

    #[test]
    fn context_block_sections_appear_in_order() {
        let mut snap = snapshot("web", 3, 3, vec![running_pod("web-0")]);
        snap.events.push(warning_event(
            "Pod/web-0",
            "BackOff",
            "Back-off restarting failed container",
        ));
        snap.app_metrics = Some(app_metrics(&[("b_metric", 2.0), ("a_metric", 1234.5678)]));
        let store = store_with(snap);
        store.add_logs(vec![error_log("web-0", "error: connection refused")]);

        let context = render_context(&store);
        assert!(context.starts_with("[K8s Context: deployment/web in namespace/default]\n"));
        assert!(context.contains("Collected at: "));

        let sections: Vec<usize> = [
            "## Deployment Status",
            "## Pods (1 total)",
            "## Recent Events (1)",
            "## Alerts: None active",
            "## Application Metrics (2)",
            "## Recent Error Logs (1)",
        ]
        .iter()
        .map(|needle| context.find(needle).unwrap_or_else(|| panic!("missing {needle}: {context}")))
        .collect();
        assert!(sections.windows(2).all(|w| w[0] < w[1]), "{context}");

        assert!(context.contains("Replicas: 3/3 ready, 3 updated, 3 available"));
        assert!(context.contains("- web-0: Running Ready restarts=0"));
        assert!(context.contains("[Warning] Pod/web-0 BackOff: Back-off restarting failed container (1m13s ago)"));
        // Metric names are sorted and values use four significant digits.
        let a = context.find("a_metric: 1235").expect("a_metric");
        let b = context.find("b_metric: 2").expect("b_metric");
        assert!(a < b);
        assert!(context.contains("web-0/app: error: connection refused"));
    }

    #[test]
    fn alerts_and_termination_are_rendered() {
        let store = critical_store("web");
        let context = render_context(&store);
        assert!(context.contains("## Active Alerts (2)"), "{context}");
        assert!(context.contains("[CRITICAL] HighRestartCount: Pod web-0 has 10 restarts (web-0)"));
        assert!(context.contains("[CRITICAL] OOMKilled: Pod web-0 was OOMKilled (exit code 137) (web-0)"));
        assert!(context.contains("  Last terminated: OOMKilled (exit code 137) at "));
    }

    #[test]
    fn restart_trend_line_reflects_the_window() {
        let store = healthy_store("web");
        let mut second = snapshot("web", 3, 3, vec![running_pod("web-0")]);
        second.pods[0].restart_count = 4;
        store.add_snapshot(second);
        let context = render_context(&store);
        assert!(context.contains("Total restarts: 4 (delta in window: 4)"), "{context}");
    }

    #[test]
    fn durations_render_in_compound_units() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(73), "1m13s");
        assert_eq!(format_duration(3723), "1h2m3s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn values_render_with_four_significant_digits() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(1234.0), "1234");
        assert_eq!(format_value(1234.5678), "1235");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(0.12345), "0.1235");
        assert_eq!(format_value(12345678.0), "1.235e7");
        assert_eq!(format_value(0.00001234), "1.234e-5");
    }
}
