//! Remote extraction channel: files out of the OSS container and tokens for
//! the metrics-query adapter.

pub mod archive;
pub mod exec;
pub mod token;

use kube::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

use crate::error::PmError;
pub use exec::{ClusterCredentials, ContainerRef, PodExecutor};
pub use token::ServiceAccountRef;

/// Copies a file produced on the remote side into a local directory.
pub trait ArchiveSource: Send + Sync {
    /// Returns the local path of the copied file,
    /// `dest_dir/<basename(remote_path)>`.
    fn copy_from_container(
        &self,
        remote_path: &str,
        dest_dir: &Path,
    ) -> impl Future<Output = Result<PathBuf, PmError>> + Send;
}

/// Cluster connection built on first use and reused afterwards.
pub struct ClusterAccess {
    credentials: ClusterCredentials,
    target: ContainerRef,
    client: OnceCell<Client>,
}

impl ClusterAccess {
    pub fn new(credentials: ClusterCredentials, target: ContainerRef) -> Self {
        Self {
            credentials,
            target,
            client: OnceCell::new(),
        }
    }

    pub fn credentials(&self) -> &ClusterCredentials {
        &self.credentials
    }

    /// A failed connection attempt is not cached; the next call retries.
    pub async fn client(&self) -> Result<&Client, PmError> {
        self.client
            .get_or_try_init(|| exec::connect(&self.credentials))
            .await
    }

    pub async fn mint_token(&self, account: &ServiceAccountRef) -> Result<String, PmError> {
        let client = self.client().await?;
        token::mint_token(client, account).await
    }
}

impl ArchiveSource for ClusterAccess {
    async fn copy_from_container(&self, remote_path: &str, dest_dir: &Path) -> Result<PathBuf, PmError> {
        let client = self.client().await?.clone();
        PodExecutor::new(client, self.target.clone())
            .copy_from_container(remote_path, dest_dir)
            .await
    }
}
