//! Fits the combined context of several targets into a character budget.
//!
//! Targets are scored healthy/warning/critical, sorted worst-first, and
//! rendered in full detail where the budget allows. When the prepared output
//! overflows, detailed renderings are downgraded to one-line summaries from
//! the healthy tail inward, and targets are omitted entirely as a last
//! resort.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DEFAULT_MAX_CONTEXT_CHARS;
use crate::model::Severity;
use crate::store::Store;

/// The placeholder emitted when nothing is configured.
pub const NO_TARGETS: &str = "[K8s Watcher: No targets configured]";

const ATTENTION_HEADER: &str = "--- Targets Requiring Attention ---\n\n";
const HEALTHY_HEADER: &str = "--- Healthy Targets ---\n";

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mode {
    Detailed,
    Compact,
    Omitted,
}

struct Prepared {
    detailed: String,
    compact: String,
    mode: Mode,
}

#[derive(Copy, Clone)]
struct Score {
    /// 0 healthy, 1 warning, 2 critical.
    rank: u8,
    alerts: usize,
}

/// Renders every target's context into at most `max_chars` characters.
/// A non-positive budget selects the default.
pub fn render_multi_context(stores: &HashMap<String, Arc<Store>>, max_chars: usize) -> String {
    let max_chars = if max_chars == 0 {
        DEFAULT_MAX_CONTEXT_CHARS
    } else {
        max_chars
    };

    if stores.is_empty() {
        return NO_TARGETS.to_string();
    }
    if stores.len() == 1 {
        let store = stores.values().next().expect("map is non-empty");
        return super::render_context(store);
    }

    // Deterministic base order, then a stable worst-first sort; ties break
    // on alert count. Targets without data are left out entirely.
    let mut keys: Vec<&String> = stores.keys().collect();
    keys.sort();
    let mut ranked: Vec<(&Arc<Store>, Score)> = Vec::with_capacity(keys.len());
    for key in keys {
        let store = &stores[key];
        if let Some(score) = health_score(store) {
            ranked.push((store, score));
        }
    }
    if ranked.is_empty() {
        return super::NO_DATA.to_string();
    }
    ranked.sort_by(|a, b| {
        b.1.rank
            .cmp(&a.1.rank)
            .then(b.1.alerts.cmp(&a.1.alerts))
    });

    let header = format!("[K8s Multi-Watcher: {} targets monitored]\n\n", stores.len());
    let budget = max_chars.saturating_sub(header.len());

    let mut prepared: Vec<Prepared> = ranked
        .iter()
        .map(|(store, score)| Prepared {
            detailed: format!("{}\n", super::render_context(store)),
            compact: format!("- {}\n", super::render_status(store)),
            mode: if score.rank >= 1 {
                Mode::Detailed
            } else {
                Mode::Compact
            },
        })
        .collect();

    // Downgrade detailed renderings from the healthy tail until the output
    // fits, then omit renderings entirely, still tail first.
    for index in (0..prepared.len()).rev() {
        if rendered_len(&prepared) <= budget {
            break;
        }
        if prepared[index].mode == Mode::Detailed {
            prepared[index].mode = Mode::Compact;
        }
    }
    for index in (0..prepared.len()).rev() {
        if rendered_len(&prepared) <= budget {
            break;
        }
        prepared[index].mode = Mode::Omitted;
    }

    let mut out = header;
    if prepared.iter().any(|p| p.mode == Mode::Detailed) {
        out.push_str(ATTENTION_HEADER);
        for target in prepared.iter().filter(|p| p.mode == Mode::Detailed) {
            out.push_str(&target.detailed);
        }
    }
    if prepared.iter().any(|p| p.mode == Mode::Compact) {
        out.push_str(HEALTHY_HEADER);
        for target in prepared.iter().filter(|p| p.mode == Mode::Compact) {
            out.push_str(&target.compact);
        }
    }
    out
}

/// Renders the one-line fleet status. Targets without data count toward the
/// total but none of the buckets.
pub fn render_multi_status(stores: &HashMap<String, Arc<Store>>) -> String {
    let (mut healthy, mut warning, mut critical) = (0usize, 0usize, 0usize);
    for store in stores.values() {
        match health_score(store) {
            Some(Score { rank: 2, .. }) => critical += 1,
            Some(Score { rank: 1, .. }) => warning += 1,
            Some(_) => healthy += 1,
            None => {}
        }
    }
    format!(
        "Watching {} targets: {} healthy, {} warning, {} critical",
        stores.len(),
        healthy,
        warning,
        critical
    )
}

/// The output size of the surviving renderings, section headers included.
fn rendered_len(prepared: &[Prepared]) -> usize {
    let mut len = 0;
    let mut any_detailed = false;
    let mut any_compact = false;
    for target in prepared {
        match target.mode {
            Mode::Detailed => {
                any_detailed = true;
                len += target.detailed.len();
            }
            Mode::Compact => {
                any_compact = true;
                len += target.compact.len();
            }
            Mode::Omitted => {}
        }
    }
    if any_detailed {
        len += ATTENTION_HEADER.len();
    }
    if any_compact {
        len += HEALTHY_HEADER.len();
    }
    len
}

/// Scores a target: critical on any critical alert; warning on missing
/// replicas, a warning alert, or a recent error log; healthy otherwise.
/// Targets without a snapshot are not scored.
fn health_score(store: &Store) -> Option<Score> {
    let snapshot = store.latest_snapshot()?;
    let alerts = store.alerts();
    let rank = if alerts.iter().any(|a| a.severity == Severity::Critical) {
        2
    } else if snapshot.deployment.ready_replicas < snapshot.deployment.replicas
        || alerts.iter().any(|a| a.severity == Severity::Warning)
        || store.has_recent_errors()
    {
        1
    } else {
        0
    };
    Some(Score {
        rank,
        alerts: alerts.len(),
    })
}
