//! Container exec channel.
//!
//! Files are copied out of the OSS container by running `tar cf -` through
//! the Kubernetes exec subresource and unpacking its stdout locally.

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::archive::{archive_prefix, destination_for, stream_unpack};
use crate::error::PmError;

/// Container the PM dumps are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerRef {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl Default for ContainerRef {
    fn default() -> Self {
        Self {
            namespace: "usm-compact".into(),
            pod: "mfsm-0".into(),
            container: "process".into(),
        }
    }
}

/// Where cluster credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCredentials {
    /// `$KUBECONFIG` or `~/.kube/config`.
    LocalKubeconfig,
    KubeconfigPath(PathBuf),
}

impl ClusterCredentials {
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => ClusterCredentials::KubeconfigPath(p.to_path_buf()),
            None => ClusterCredentials::LocalKubeconfig,
        }
    }
}

fn cluster_error(scope: &str, err: impl ToString) -> PmError {
    PmError::remote(scope, err)
}

/// Builds a client for the given credentials.
pub async fn connect(credentials: &ClusterCredentials) -> Result<Client, PmError> {
    let kubeconfig = match credentials {
        ClusterCredentials::LocalKubeconfig => Kubeconfig::read(),
        ClusterCredentials::KubeconfigPath(path) => Kubeconfig::read_from(path),
    }
    .map_err(|e| cluster_error("kubeconfig", e))?;

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| cluster_error("kubeconfig", e))?;

    Client::try_from(config).map_err(|e| cluster_error("kube client", e))
}

/// Runs commands inside one container.
#[derive(Clone)]
pub struct PodExecutor {
    client: Client,
    target: ContainerRef,
}

impl PodExecutor {
    pub fn new(client: Client, target: ContainerRef) -> Self {
        Self { client, target }
    }

    /// Copies `source` out of the container into `dest_dir` and returns
    /// `dest_dir/<basename(source)>`.
    ///
    /// Remote stderr is forwarded to the host's stderr. A non-success exit
    /// status of the remote `tar` is reported even when something was
    /// unpacked.
    #[instrument(skip(self), fields(pod = %self.target.pod))]
    pub async fn copy_from_container(&self, source: &str, dest_dir: &Path) -> Result<PathBuf, PmError> {
        let dest = destination_for(source, dest_dir)?;
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.target.namespace);
        let params = AttachParams::default()
            .container(self.target.container.as_str())
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);

        debug!("Executing tar in container");
        let mut process = pods
            .exec(&self.target.pod, vec!["tar", "cf", "-", source], &params)
            .await
            .map_err(|e| PmError::remote(source, e))?;

        let stdout = process
            .stdout()
            .ok_or_else(|| PmError::remote(source, "exec stdout not attached"))?;
        if let Some(mut stderr) = process.stderr() {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut stderr, &mut tokio::io::stderr()).await;
            });
        }
        let status = process.take_status();

        let unpacked = stream_unpack(stdout, dest, archive_prefix(source)).await;

        if let Some(status) = status {
            if let Some(status) = status.await {
                if status.status.as_deref() != Some("Success") {
                    let reason = status
                        .message
                        .unwrap_or_else(|| "remote command failed".to_string());
                    warn!(%reason, "Remote tar exited with failure");
                    return Err(PmError::remote(source, reason));
                }
            }
        }
        if let Err(e) = process.join().await {
            debug!(error = %e, "Exec session closed with error");
        }

        let local = unpacked?;
        info!(local = %local.display(), "Copied file from container");
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_container() {
        let target = ContainerRef::default();
        assert_eq!(target.namespace, "usm-compact");
        assert_eq!(target.pod, "mfsm-0");
        assert_eq!(target.container, "process");
    }

    #[test]
    fn test_credentials_from_path() {
        assert_eq!(ClusterCredentials::from_path(None), ClusterCredentials::LocalKubeconfig);
        assert_eq!(
            ClusterCredentials::from_path(Some(Path::new("/mnt/data/config"))),
            ClusterCredentials::KubeconfigPath(PathBuf::from("/mnt/data/config"))
        );
    }

    #[tokio::test]
    async fn test_connect_with_missing_kubeconfig_fails() {
        let creds = ClusterCredentials::KubeconfigPath(PathBuf::from("/nonexistent/kubeconfig"));
        let err = connect(&creds).await.err().expect("connect should fail");
        assert_eq!(err.kind(), "remote_request");
    }
}
