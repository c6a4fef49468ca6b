//! Collectors, one per upstream source.
//!
//! Each collector is constructed with its target identity and any clients it
//! needs, and exposes a single async operation returning a typed data-model
//! fragment. Collectors never write the store; the watcher sequences them
//! and applies the per-source failure policy at each call site.

pub(crate) mod app_metrics;
pub(crate) mod deployment;
pub(crate) mod events;
pub(crate) mod hpa;
pub(crate) mod logs;
pub(crate) mod pod_metrics;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use thiserror::Error;

/// Indicates that the primary workload lookup failed and the cycle cannot
/// proceed.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The deployment could not be fetched.
    #[error("failed to read deployment {0}: {1}")]
    Deployment(String, #[source] kube::Error),

    /// The deployment carries no usable pod label selector.
    #[error("deployment {0} has no usable label selector")]
    NoSelector(String),

    /// The deployment's pods could not be listed.
    #[error("failed to list pods for {0}: {1}")]
    ListPods(String, #[source] kube::Error),

    /// Namespace events could not be listed.
    #[error("failed to list events in {0}: {1}")]
    ListEvents(String, #[source] kube::Error),
}

/// Renders a label selector in list-query form, covering match labels and
/// the set-based operators.
pub(crate) fn selector_string(selector: &LabelSelector) -> Option<String> {
    let mut terms = Vec::new();
    if let Some(labels) = &selector.match_labels {
        for (key, value) in labels {
            terms.push(format!("{key}={value}"));
        }
    }
    if let Some(expressions) = &selector.match_expressions {
        for expr in expressions {
            let values = expr.values.as_deref().unwrap_or_default().join(",");
            match expr.operator.as_str() {
                "In" => terms.push(format!("{} in ({values})", expr.key)),
                "NotIn" => terms.push(format!("{} notin ({values})", expr.key)),
                "Exists" => terms.push(expr.key.clone()),
                "DoesNotExist" => terms.push(format!("!{}", expr.key)),
                other => {
                    tracing::debug!(operator = %other, key = %expr.key, "ignoring selector operator");
                }
            }
        }
    }
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(","))
    }
}

/// Renders a condition as `Type=Status (Reason: Message)`, omitting the
/// parenthetical when neither a reason nor a message is present.
pub(crate) fn condition_string(
    type_: &str,
    status: &str,
    reason: Option<&str>,
    message: Option<&str>,
) -> String {
    let reason = reason.unwrap_or_default();
    let message = message.unwrap_or_default();
    if reason.is_empty() && message.is_empty() {
        format!("{type_}={status}")
    } else {
        format!("{type_}={status} ({reason}: {message})")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;
    use std::collections::BTreeMap;

    #[test]
    fn selector_renders_match_labels() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([
                ("app".to_string(), "web".to_string()),
                ("tier".to_string(), "frontend".to_string()),
            ])),
            match_expressions: None,
        };
        assert_eq!(
            selector_string(&selector).as_deref(),
            Some("app=web,tier=frontend")
        );
    }

    #[test]
    fn selector_renders_expressions() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "env".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["prod".to_string(), "staging".to_string()]),
            }]),
        };
        assert_eq!(
            selector_string(&selector).as_deref(),
            Some("env in (prod,staging)")
        );
    }

    #[test]
    fn empty_selector_is_none() {
        assert_eq!(selector_string(&LabelSelector::default()), None);
    }

    #[test]
    fn condition_strings_skip_empty_detail() {
        assert_eq!(condition_string("Ready", "False", None, None), "Ready=False");
        assert_eq!(
            condition_string(
                "Ready",
                "False",
                Some("ContainersNotReady"),
                Some("containers with unready status: [app]"),
            ),
            "Ready=False (ContainersNotReady: containers with unready status: [app])"
        );
    }
}
