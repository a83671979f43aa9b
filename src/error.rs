//! Error types for the transcode launcher
//!
//! One enum covers the whole run: configuration problems before anything
//! touches the cluster, submission/transport failures from the Kubernetes
//! API, the transcode pod itself failing, and the cleanup failure that can
//! leak a pod on a shared cluster.

use thiserror::Error;

/// Main error type for a transcode run
#[derive(Debug, Error)]
pub enum Error {
    /// A required external identifier is missing or empty
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what is missing or invalid
        message: String,
    },

    /// The Kubernetes client could not be built from the environment
    #[error("failed to build kubernetes client: {source}")]
    ClientInit {
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// The launcher's working directory could not be resolved
    #[error("failed to resolve working directory: {source}")]
    WorkingDir {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The cluster rejected the pod creation request
    #[error("failed to create transcode pod: {source}")]
    Submission {
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// A status read failed mid-run; the run cannot continue
    #[error("failed to read status of pod '{pod}': {source}")]
    Transport {
        /// Name of the pod being observed
        pod: String,
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// The cluster reports the transcode pod reached the Failed phase
    #[error("pod '{pod}' failed")]
    TranscodeFailed {
        /// Name of the failed pod
        pod: String,
    },

    /// Deleting the pod at the end of the run failed
    ///
    /// This is the one error that implies a leaked cluster resource: the
    /// pod was created but could not be removed.
    #[error("failed to clean up pod '{pod}': {source}")]
    Cleanup {
        /// Name of the pod that was not removed
        pod: String,
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// An invariant the launcher relies on did not hold
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means a pod may have been left behind on the
    /// cluster
    ///
    /// Callers use this to escalate beyond a normal error report: an
    /// undeleted pod holds PVC mounts and node resources until an operator
    /// removes it by hand.
    pub fn may_leak_pod(&self) -> bool {
        matches!(self, Error::Cleanup { .. })
    }
}
