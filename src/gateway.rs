//! Cluster gateway for pod operations
//!
//! Narrow trait over the three pod operations a transcode run needs:
//! submit, phase read, remove. The launcher is written against the trait
//! so tests drive it with a mock while production talks to a real
//! API server.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::error::Error;
use crate::pod::{phase_of, PodPhase};
use crate::Result;

/// Identity of one submitted pod
///
/// Carries the server-assigned name (the generate-name prefix resolved to
/// a concrete name) and the namespace it lives in. Later phase reads and
/// the final removal address the pod through this handle only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodHandle {
    /// Name the API server assigned at submission
    pub name: String,
    /// Namespace the pod was created in
    pub namespace: String,
}

/// Pod operations against the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PodGateway: Send + Sync {
    /// Create the pod and return a handle bearing its assigned name
    async fn submit(&self, pod: &Pod) -> Result<PodHandle>;

    /// Read the pod's current lifecycle phase
    async fn phase(&self, handle: &PodHandle) -> Result<PodPhase>;

    /// Delete the pod
    ///
    /// A pod that no longer exists counts as removed.
    async fn remove(&self, handle: &PodHandle) -> Result<()>;
}

/// Gateway backed by a real cluster connection, scoped to one namespace
pub struct KubePodGateway {
    pods: Api<Pod>,
    namespace: String,
}

impl KubePodGateway {
    /// Create a gateway over `client` scoped to `namespace`
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl PodGateway for KubePodGateway {
    async fn submit(&self, pod: &Pod) -> Result<PodHandle> {
        let created = self
            .pods
            .create(&PostParams::default(), pod)
            .await
            .map_err(|source| Error::Submission { source })?;
        let name = created
            .metadata
            .name
            .ok_or_else(|| Error::internal("API server returned a pod without a name"))?;
        info!(pod = %name, namespace = %self.namespace, "Submitted transcode pod");
        Ok(PodHandle {
            name,
            namespace: self.namespace.clone(),
        })
    }

    async fn phase(&self, handle: &PodHandle) -> Result<PodPhase> {
        let pod = self
            .pods
            .get(&handle.name)
            .await
            .map_err(|source| Error::Transport {
                pod: handle.name.clone(),
                source,
            })?;
        let phase = phase_of(&pod);
        debug!(pod = %handle.name, phase = %phase, "Observed pod phase");
        Ok(phase)
    }

    async fn remove(&self, handle: &PodHandle) -> Result<()> {
        match self.pods.delete(&handle.name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(pod = %handle.name, "Removed transcode pod");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(pod = %handle.name, "Pod already gone");
                Ok(())
            }
            Err(source) => Err(Error::Cleanup {
                pod: handle.name.clone(),
                source,
            }),
        }
    }
}
