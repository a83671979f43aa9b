//! Environment-derived launcher configuration
//!
//! Everything the launcher needs from its hosting environment is gathered
//! into one [`Config`] constructed at startup and passed by reference into
//! the pod builder and the launcher. Nothing else reads process-wide state,
//! so tests can inject arbitrary configurations.
//!
//! Required variables: `KUBE_NAMESPACE`, `DATA_PVC`, `CONFIG_PVC`,
//! `TRANSCODE_PVC`, `PMS_IMAGE`, `PMS_INTERNAL_ADDRESS`. Optional:
//! `TRANSCODE_NODE_ARCH` (defaults to `amd64`).

use crate::error::Error;

/// Environment variable naming the namespace transcode pods run in
const ENV_NAMESPACE: &str = "KUBE_NAMESPACE";
/// Environment variable naming the media library claim
const ENV_DATA_PVC: &str = "DATA_PVC";
/// Environment variable naming the PMS configuration claim
const ENV_CONFIG_PVC: &str = "CONFIG_PVC";
/// Environment variable naming the transcode scratch claim
const ENV_TRANSCODE_PVC: &str = "TRANSCODE_PVC";
/// Environment variable naming the PMS container image
const ENV_PMS_IMAGE: &str = "PMS_IMAGE";
/// Environment variable naming the in-cluster PMS address
const ENV_PMS_INTERNAL_ADDRESS: &str = "PMS_INTERNAL_ADDRESS";
/// Environment variable overriding the node architecture constraint
const ENV_NODE_ARCH: &str = "TRANSCODE_NODE_ARCH";

/// Node architecture transcode pods are scheduled onto unless overridden
const DEFAULT_NODE_ARCH: &str = "amd64";

/// External identifiers for one launcher run
///
/// Constructed once at startup from the environment. An empty value for any
/// required field is rejected up front: an empty claim name or namespace
/// would produce a syntactically valid pod the cluster rejects or
/// mis-schedules, which is much harder to diagnose later.
#[derive(Clone, Debug)]
pub struct Config {
    /// Namespace the transcode pod is created in
    pub namespace: String,
    /// Claim holding the media library, mounted read-only at `/data`
    pub data_pvc: String,
    /// Claim holding PMS configuration, mounted read-only at `/config`
    pub config_pvc: String,
    /// Claim holding transcoder scratch space, mounted read-write at
    /// `/transcode`
    pub transcode_pvc: String,
    /// Image the transcode pod runs; must contain the PMS transcoder at the
    /// same path the launcher was invoked as
    pub pms_image: String,
    /// Address of the PMS service inside the cluster, substituted for the
    /// loopback address in transcoder arguments
    pub pms_internal_address: String,
    /// Node architecture the pod is constrained to (`kubernetes.io/arch`)
    pub node_arch: String,
}

impl Config {
    /// Load the configuration from the process environment
    ///
    /// Fails with a configuration error naming the first variable that is
    /// unset or empty. Nothing is submitted to the cluster when this fails.
    pub fn from_env() -> Result<Self, Error> {
        let config = Self {
            namespace: require(ENV_NAMESPACE)?,
            data_pvc: require(ENV_DATA_PVC)?,
            config_pvc: require(ENV_CONFIG_PVC)?,
            transcode_pvc: require(ENV_TRANSCODE_PVC)?,
            pms_image: require(ENV_PMS_IMAGE)?,
            pms_internal_address: require(ENV_PMS_INTERNAL_ADDRESS)?,
            node_arch: std::env::var(ENV_NODE_ARCH)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_NODE_ARCH.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every required identifier is non-empty
    ///
    /// `from_env` already guarantees this; the pod builder calls it again so
    /// directly-constructed configurations get the same guard.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            (ENV_NAMESPACE, &self.namespace),
            (ENV_DATA_PVC, &self.data_pvc),
            (ENV_CONFIG_PVC, &self.config_pvc),
            (ENV_TRANSCODE_PVC, &self.transcode_pvc),
            (ENV_PMS_IMAGE, &self.pms_image),
            (ENV_PMS_INTERNAL_ADDRESS, &self.pms_internal_address),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(Error::configuration(format!(
                    "{name} is empty, please configure the {name} environment variable"
                )));
            }
        }
        Ok(())
    }
}

/// Read a required environment variable, rejecting unset and empty values
fn require(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::configuration(format!(
            "{name} is not set, please configure the {name} environment variable"
        ))),
    }
}
