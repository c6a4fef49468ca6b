//! Utilities for configuring a [`kube::Client`] from watch configuration.

use std::path::Path;

use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use thiserror::Error;

/// Indicates an error occurred while configuring the Kubernetes client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Indicates that the kubeconfig file could not be read
    #[error(transparent)]
    Kubeconfig(#[from] KubeconfigError),

    /// Indicates that the in-cluster configuration could not be read
    #[error(transparent)]
    InCluster(#[from] InClusterError),

    /// Indicates that the client could not be initialized
    #[error(transparent)]
    Client(#[from] kube::Error),
}

/// Initializes a Kubernetes client.
///
/// An explicit `kubeconfig` path is used verbatim (with its current
/// context). Without one, the default kubeconfig is honored — including the
/// `$KUBECONFIG` environment variable — and the in-cluster configuration is
/// used as a fallback, so an empty setting works both on a workstation and
/// inside a pod.
pub async fn init(kubeconfig: Option<&Path>) -> Result<Client, ClientError> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => match Config::from_kubeconfig(&KubeConfigOptions::default()).await {
            Ok(config) => config,
            Err(_) => Config::incluster()?,
        },
    };

    Client::try_from(config).map_err(Into::into)
}
