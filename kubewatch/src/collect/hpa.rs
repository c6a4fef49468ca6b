//! Finds the horizontal pod autoscaler targeting the deployment, if any.

use k8s_openapi::api::autoscaling::v2::{
    HorizontalPodAutoscaler, MetricStatus, MetricValueStatus,
};
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::debug;

use crate::model::HpaStatus;

pub(crate) struct HpaCollector {
    client: Client,
    namespace: String,
    deployment: String,
}

impl HpaCollector {
    pub fn new(client: Client, namespace: String, deployment: String) -> Self {
        Self {
            client,
            namespace,
            deployment,
        }
    }

    /// Returns the autoscaler whose scale target is the deployment, or
    /// `None` — an HPA is optional, and listing failures are tolerated.
    pub async fn collect(&self) -> Option<HpaStatus> {
        let api: Api<HorizontalPodAutoscaler> =
            Api::namespaced(self.client.clone(), &self.namespace);
        let list = match api.list(&ListParams::default()).await {
            Ok(list) => list,
            Err(error) => {
                debug!(namespace = %self.namespace, %error, "failed to list autoscalers");
                return None;
            }
        };

        for hpa in list.items {
            let Some(spec) = hpa.spec else {
                continue;
            };
            if spec.scale_target_ref.kind != "Deployment"
                || spec.scale_target_ref.name != self.deployment
            {
                continue;
            }
            let status = hpa.status.unwrap_or_default();
            return Some(HpaStatus {
                name: hpa.metadata.name.unwrap_or_default(),
                // The autoscaler API defaults an unset floor to one replica.
                min_replicas: spec.min_replicas.unwrap_or(1),
                max_replicas: spec.max_replicas,
                current_replicas: status.current_replicas.unwrap_or(0),
                desired_replicas: status.desired_replicas,
                current_metrics: status
                    .current_metrics
                    .unwrap_or_default()
                    .iter()
                    .map(format_metric)
                    .collect(),
            });
        }
        None
    }
}

/// Renders one current metric as `<name>: current=<utilization>%` for
/// utilization readings and `<name>: current=<value>` otherwise.
fn format_metric(metric: &MetricStatus) -> String {
    if let Some(resource) = &metric.resource {
        return format_current(&resource.name, &resource.current);
    }
    if let Some(container) = &metric.container_resource {
        return format_current(&container.name, &container.current);
    }
    if let Some(pods) = &metric.pods {
        return format_current(&pods.metric.name, &pods.current);
    }
    if let Some(object) = &metric.object {
        return format_current(&object.metric.name, &object.current);
    }
    if let Some(external) = &metric.external {
        return format_current(&external.metric.name, &external.current);
    }
    format!("{}: current=unknown", metric.type_)
}

fn format_current(name: &str, current: &MetricValueStatus) -> String {
    if let Some(utilization) = current.average_utilization {
        return format!("{name}: current={utilization}%");
    }
    let value = current
        .average_value
        .as_ref()
        .or(current.value.as_ref())
        .map(|quantity| quantity.0.clone())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{name}: current={value}")
}
