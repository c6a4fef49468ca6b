//! Collects recent events for the deployment and its pods.

use std::collections::HashSet;

use chrono::Utc;
use k8s_openapi::api::core::v1::Event;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::warn;

use super::CollectError;
use crate::model::K8sEvent;

pub(crate) struct EventsCollector {
    client: Client,
    namespace: String,
    deployment: String,
}

impl EventsCollector {
    pub fn new(client: Client, namespace: String, deployment: String) -> Self {
        Self {
            client,
            namespace,
            deployment,
        }
    }

    /// Lists events involving the deployment itself, then namespace events
    /// involving any of the given pods. The combined list preserves the
    /// insertion order of the two passes.
    pub async fn collect(&self, pod_names: &HashSet<String>) -> Result<Vec<K8sEvent>, CollectError> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), &self.namespace);
        let mut events = Vec::new();

        // Deployment-scoped query; failures are tolerated.
        let scoped = ListParams::default().fields(&format!(
            "involvedObject.name={}",
            self.deployment
        ));
        match api.list(&scoped).await {
            Ok(list) => events.extend(list.items.iter().map(normalize)),
            Err(error) => {
                warn!(deployment = %self.deployment, %error, "failed to list deployment events");
            }
        }

        // Namespace-wide query filtered to the deployment's pods.
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|error| CollectError::ListEvents(self.namespace.clone(), error))?;
        for event in &list.items {
            let involved = event.involved_object.name.as_deref().unwrap_or_default();
            if pod_names.contains(involved) {
                events.push(normalize(event));
            }
        }

        Ok(events)
    }
}

/// Normalizes an upstream event, preferring its last-seen time and falling
/// back to its creation time.
fn normalize(event: &Event) -> K8sEvent {
    let timestamp = event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
        .unwrap_or_else(Utc::now);
    let kind = event.involved_object.kind.as_deref().unwrap_or_default();
    let name = event.involved_object.name.as_deref().unwrap_or_default();
    K8sEvent {
        timestamp,
        type_: event
            .type_
            .clone()
            .unwrap_or_else(|| "Normal".to_string()),
        reason: event.reason.clone().unwrap_or_default(),
        message: event.message.clone().unwrap_or_default(),
        object: format!("{kind}/{name}"),
        count: event.count.unwrap_or(1),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn normalize_prefers_last_timestamp() {
        let last = Utc::now();
        let created = last - chrono::Duration::minutes(10);
        let event = Event {
            metadata: ObjectMeta {
                creation_timestamp: Some(Time(created)),
                ..Default::default()
            },
            last_timestamp: Some(Time(last)),
            type_: Some("Warning".to_string()),
            reason: Some("BackOff".to_string()),
            message: Some("Back-off restarting failed container".to_string()),
            involved_object: k8s_openapi::api::core::v1::ObjectReference {
                kind: Some("Pod".to_string()),
                name: Some("web-0".to_string()),
                ..Default::default()
            },
            count: Some(7),
            ..Default::default()
        };

        let normalized = normalize(&event);
        assert_eq!(normalized.timestamp, last);
        assert_eq!(normalized.type_, "Warning");
        assert_eq!(normalized.object, "Pod/web-0");
        assert_eq!(normalized.count, 7);
    }

    #[test]
    fn normalize_falls_back_to_creation_time() {
        let created = Utc::now() - chrono::Duration::hours(1);
        let event = Event {
            metadata: ObjectMeta {
                creation_timestamp: Some(Time(created)),
                ..Default::default()
            },
            ..Default::default()
        };

        let normalized = normalize(&event);
        assert_eq!(normalized.timestamp, created);
        assert_eq!(normalized.type_, "Normal");
        assert_eq!(normalized.count, 1);
    }
}
