//! The primary collector: deployment status plus the pods behind its label
//! selector. A failure here is cycle-fatal.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;

use super::{condition_string, selector_string, CollectError};
use crate::model::{DeploymentStatus, PodStatus, TerminationInfo};

/// The deployment-and-pods fragment of one cycle.
pub(crate) struct WorkloadSample {
    /// The moment the workload was sampled.
    pub sampled_at: DateTime<Utc>,
    pub deployment: DeploymentStatus,
    pub pods: Vec<PodStatus>,
    /// Pod-to-container names, consumed by the log collector.
    pub containers: Vec<PodContainers>,
}

/// Container names of one pod.
pub(crate) struct PodContainers {
    pub name: String,
    pub containers: Vec<String>,
}

pub(crate) struct DeploymentCollector {
    client: Client,
    namespace: String,
    deployment: String,
}

impl DeploymentCollector {
    pub fn new(client: Client, namespace: String, deployment: String) -> Self {
        Self {
            client,
            namespace,
            deployment,
        }
    }

    fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.deployment)
    }

    /// Fetches the deployment and lists its pods.
    pub async fn collect(&self) -> Result<WorkloadSample, CollectError> {
        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &self.namespace);
        let deployment = deployments
            .get(&self.deployment)
            .await
            .map_err(|error| CollectError::Deployment(self.key(), error))?;

        let spec = deployment.spec.unwrap_or_default();
        let selector =
            selector_string(&spec.selector).ok_or_else(|| CollectError::NoSelector(self.key()))?;

        let pods_api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let pod_list = pods_api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|error| CollectError::ListPods(self.key(), error))?;

        let status = deployment.status.unwrap_or_default();
        let deployment = DeploymentStatus {
            name: self.deployment.clone(),
            namespace: self.namespace.clone(),
            // Kubernetes defaults an unset replica count to one.
            replicas: spec.replicas.unwrap_or(1),
            ready_replicas: status.ready_replicas.unwrap_or(0),
            updated_replicas: status.updated_replicas.unwrap_or(0),
            available_replicas: status.available_replicas.unwrap_or(0),
            conditions: status
                .conditions
                .unwrap_or_default()
                .iter()
                .map(|c| {
                    condition_string(&c.type_, &c.status, c.reason.as_deref(), c.message.as_deref())
                })
                .collect(),
            strategy: spec
                .strategy
                .and_then(|s| s.type_)
                .unwrap_or_else(|| "RollingUpdate".to_string()),
        };

        let mut pods = Vec::with_capacity(pod_list.items.len());
        let mut containers = Vec::with_capacity(pod_list.items.len());
        for pod in &pod_list.items {
            pods.push(extract_pod_status(pod));
            containers.push(extract_pod_containers(pod));
        }

        Ok(WorkloadSample {
            sampled_at: Utc::now(),
            deployment,
            pods,
            containers,
        })
    }
}

/// Derives the normalized status of one pod. Extraction is total: every pod
/// yields a status, however incomplete the upstream object.
fn extract_pod_status(pod: &Pod) -> PodStatus {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let container_count = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.len() as i32)
        .unwrap_or(0);

    let status = pod.status.as_ref();
    let phase = status
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let start_time = status.and_then(|s| s.start_time.as_ref()).map(|t| t.0);

    let mut restart_count = 0;
    let mut ready_count = 0;
    let mut last_terminated = None;
    for cs in status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default()
    {
        restart_count += cs.restart_count;
        if cs.ready {
            ready_count += 1;
        }
        if last_terminated.is_none() {
            if let Some(term) = cs.last_state.as_ref().and_then(|s| s.terminated.as_ref()) {
                last_terminated = Some(TerminationInfo {
                    reason: term.reason.clone().unwrap_or_default(),
                    exit_code: term.exit_code,
                    started_at: term.started_at.as_ref().map(|t| t.0),
                    ended_at: term.finished_at.as_ref().map(|t| t.0),
                });
            }
        }
    }

    let conditions = status
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default()
        .iter()
        .filter(|c| c.status != "True")
        .map(|c| condition_string(&c.type_, &c.status, c.reason.as_deref(), c.message.as_deref()))
        .collect();

    PodStatus {
        name,
        phase,
        ready: ready_count == container_count,
        restart_count,
        container_count,
        ready_count,
        start_time,
        conditions,
        cpu_usage: None,
        memory_usage: None,
        last_terminated,
    }
}

fn extract_pod_containers(pod: &Pod) -> PodContainers {
    PodContainers {
        name: pod.metadata.name.clone().unwrap_or_default(),
        containers: pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStatus, PodCondition,
    };
    use k8s_openapi::api::core::v1::PodStatus as K8sPodStatus;

    fn container_status(name: &str, ready: bool, restarts: i32) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            ready,
            restart_count: restarts,
            ..ContainerStatus::default()
        }
    }

    #[test]
    fn pod_counts_are_summed_across_containers() {
        let pod = Pod {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("web-0".to_string()),
                ..Default::default()
            },
            spec: Some(k8s_openapi::api::core::v1::PodSpec {
                containers: vec![
                    k8s_openapi::api::core::v1::Container {
                        name: "app".to_string(),
                        ..Default::default()
                    },
                    k8s_openapi::api::core::v1::Container {
                        name: "sidecar".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            status: Some(K8sPodStatus {
                phase: Some("Running".to_string()),
                container_statuses: Some(vec![
                    container_status("app", true, 3),
                    container_status("sidecar", false, 2),
                ]),
                ..Default::default()
            }),
        };

        let status = extract_pod_status(&pod);
        assert_eq!(status.name, "web-0");
        assert_eq!(status.phase, "Running");
        assert_eq!(status.container_count, 2);
        assert_eq!(status.ready_count, 1);
        assert_eq!(status.restart_count, 5);
        assert!(!status.ready);

        let containers = extract_pod_containers(&pod);
        assert_eq!(containers.containers, vec!["app", "sidecar"]);
    }

    #[test]
    fn last_terminated_state_is_captured() {
        let mut cs = container_status("app", true, 1);
        cs.last_state = Some(ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code: 137,
                reason: Some("OOMKilled".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let pod = Pod {
            status: Some(K8sPodStatus {
                container_statuses: Some(vec![cs]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let status = extract_pod_status(&pod);
        let term = status.last_terminated.expect("termination info");
        assert_eq!(term.reason, "OOMKilled");
        assert_eq!(term.exit_code, 137);
    }

    #[test]
    fn only_non_true_conditions_are_recorded() {
        let pod = Pod {
            status: Some(K8sPodStatus {
                conditions: Some(vec![
                    PodCondition {
                        type_: "Initialized".to_string(),
                        status: "True".to_string(),
                        ..Default::default()
                    },
                    PodCondition {
                        type_: "Ready".to_string(),
                        status: "False".to_string(),
                        reason: Some("ContainersNotReady".to_string()),
                        message: Some("containers with unready status: [app]".to_string()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let status = extract_pod_status(&pod);
        assert_eq!(
            status.conditions,
            vec!["Ready=False (ContainersNotReady: containers with unready status: [app])"]
        );
    }
}
