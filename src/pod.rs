//! Transcode pod construction and phase inspection
//!
//! Builds the one-shot Pod that runs a single transcode. Each pod:
//! - Runs a single `plex` container from the PMS image, so the transcoder
//!   binary sits at the same path as on the server
//! - Executes the rewritten invocation verbatim, in the same working
//!   directory PMS launched us from
//! - Mounts the media and server-config PVCs read-only and the transcode
//!   scratch PVC writable
//! - Pins onto amd64 nodes and never restarts

use k8s_openapi::api::core::v1::{
    Container, EnvVar, PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::config::Config;
use crate::invocation::Invocation;
use crate::Result;

/// Prefix the API server extends with a random suffix to name each pod
const POD_GENERATE_NAME: &str = "pms-elastic-transcoder-";

/// Name of the single transcoding container
const CONTAINER_NAME: &str = "plex";

/// Mount path for the media library volume
const DATA_MOUNT_PATH: &str = "/data";

/// Mount path for the server configuration volume
const CONFIG_MOUNT_PATH: &str = "/config";

/// Mount path for the transcode scratch volume
const TRANSCODE_MOUNT_PATH: &str = "/transcode";

/// Node selector key for CPU architecture
const ARCH_LABEL: &str = "kubernetes.io/arch";

/// Lifecycle phase of a transcode pod as reported by the API server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted but not yet running
    Pending,
    /// At least one container is executing
    Running,
    /// All containers exited zero
    Succeeded,
    /// A container exited non-zero or was killed
    Failed,
    /// Phase missing or unrecognized
    Unknown,
}

impl PodPhase {
    /// Whether this phase ends the observation loop
    pub fn is_terminal(self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Read the phase off a pod's status
///
/// A pod with no status yet, or a phase string this build doesn't know,
/// maps to [`PodPhase::Unknown`] and keeps the observation loop going.
pub fn phase_of(pod: &Pod) -> PodPhase {
    match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
        Some("Pending") => PodPhase::Pending,
        Some("Running") => PodPhase::Running,
        Some("Succeeded") => PodPhase::Succeeded,
        Some("Failed") => PodPhase::Failed,
        _ => PodPhase::Unknown,
    }
}

/// Build the Pod for one transcode run.
///
/// The pod:
/// - Is named by the API server from the `pms-elastic-transcoder-` prefix
/// - Runs the `plex` container with the invocation's full argument list as
///   the container command and its environment as container env, sorted by
///   name
/// - Mounts `data` and `config` read-only and `transcode` writable
/// - Selects nodes by the configured architecture
/// - Uses `restartPolicy: Never`; retrying a half-written transcode is the
///   server's call, not the kubelet's
///
/// Fails if any required configuration identifier is empty.
pub fn build_transcode_pod(
    config: &Config,
    invocation: &Invocation,
    working_dir: &str,
) -> Result<Pod> {
    config.validate()?;

    let env: Vec<EnvVar> = invocation
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.pms_image.clone()),
        command: Some(invocation.args.clone()),
        env: Some(env),
        working_dir: Some(working_dir.to_string()),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "data".to_string(),
                mount_path: DATA_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: "config".to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: "transcode".to_string(),
                mount_path: TRANSCODE_MOUNT_PATH.to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let volumes = vec![
        pvc_volume("data", &config.data_pvc),
        pvc_volume("config", &config.config_pvc),
        pvc_volume("transcode", &config.transcode_pvc),
    ];

    Ok(Pod {
        metadata: ObjectMeta {
            generate_name: Some(POD_GENERATE_NAME.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_selector: Some(
                [(ARCH_LABEL.to_string(), config.node_arch.clone())]
                    .into_iter()
                    .collect(),
            ),
            restart_policy: Some("Never".to_string()),
            containers: vec![container],
            volumes: Some(volumes),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn pvc_volume(name: &str, claim: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;

    fn sample_config() -> Config {
        Config {
            namespace: "plex".to_string(),
            data_pvc: "plex-data".to_string(),
            config_pvc: "plex-config".to_string(),
            transcode_pvc: "plex-transcode".to_string(),
            pms_image: "plexinc/pms-docker:1.41.0".to_string(),
            pms_internal_address: "http://pms:32400".to_string(),
            node_arch: "amd64".to_string(),
        }
    }

    fn sample_invocation() -> Invocation {
        Invocation::new(
            vec![
                "/usr/lib/plexmediaserver/Plex Transcoder".to_string(),
                "-loglevel".to_string(),
                "debug".to_string(),
            ],
            [("X_PLEX_TOKEN".to_string(), "secret".to_string())].into(),
        )
    }

    fn sample_pod() -> Pod {
        build_transcode_pod(&sample_config(), &sample_invocation(), "/tmp/session").unwrap()
    }

    #[test]
    fn pod_name_is_generated_from_fixed_prefix() {
        let pod = sample_pod();
        assert_eq!(pod.metadata.name, None);
        assert_eq!(
            pod.metadata.generate_name.as_deref(),
            Some("pms-elastic-transcoder-")
        );
    }

    #[test]
    fn pod_runs_the_invocation_as_the_container_command() {
        let pod = sample_pod();
        let container = &pod.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.name, CONTAINER_NAME);
        assert_eq!(
            container.command.as_ref().unwrap(),
            &sample_invocation().args
        );
        assert_eq!(container.working_dir.as_deref(), Some("/tmp/session"));
        assert_eq!(container.image.as_deref(), Some("plexinc/pms-docker:1.41.0"));
    }

    #[test]
    fn pod_env_is_sorted_by_name() {
        let invocation = Invocation::new(
            vec!["/transcoder".to_string()],
            [
                ("ZEBRA".to_string(), "z".to_string()),
                ("ALPHA".to_string(), "a".to_string()),
                ("HOME".to_string(), "/config".to_string()),
            ]
            .into(),
        );
        let pod = build_transcode_pod(&sample_config(), &invocation, "/").unwrap();
        let env = pod.spec.as_ref().unwrap().containers[0]
            .env
            .as_ref()
            .unwrap();
        let names: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ALPHA", "HOME", "ZEBRA"]);
        assert_eq!(env[0].value.as_deref(), Some("a"));
    }

    #[test]
    fn pod_mounts_media_and_config_read_only() {
        let pod = sample_pod();
        let mounts = pod.spec.as_ref().unwrap().containers[0]
            .volume_mounts
            .as_ref()
            .unwrap();
        assert_eq!(mounts.len(), 3);
        assert_eq!(mounts[0].mount_path, "/data");
        assert_eq!(mounts[0].read_only, Some(true));
        assert_eq!(mounts[1].mount_path, "/config");
        assert_eq!(mounts[1].read_only, Some(true));
        assert_eq!(mounts[2].mount_path, "/transcode");
        assert_eq!(mounts[2].read_only, None);
    }

    #[test]
    fn pod_volumes_reference_the_configured_claims() {
        let pod = sample_pod();
        let volumes = pod.spec.as_ref().unwrap().volumes.as_ref().unwrap();
        let claims: Vec<(&str, &str)> = volumes
            .iter()
            .map(|v| {
                (
                    v.name.as_str(),
                    v.persistent_volume_claim
                        .as_ref()
                        .unwrap()
                        .claim_name
                        .as_str(),
                )
            })
            .collect();
        assert_eq!(
            claims,
            vec![
                ("data", "plex-data"),
                ("config", "plex-config"),
                ("transcode", "plex-transcode"),
            ]
        );
    }

    #[test]
    fn pod_selects_configured_architecture_and_never_restarts() {
        let pod = sample_pod();
        let spec = pod.spec.as_ref().unwrap();
        assert_eq!(
            spec.node_selector.as_ref().unwrap().get("kubernetes.io/arch"),
            Some(&"amd64".to_string())
        );
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn pod_build_rejects_incomplete_configuration() {
        let mut config = sample_config();
        config.data_pvc = String::new();
        let err = build_transcode_pod(&config, &sample_invocation(), "/").unwrap_err();
        assert!(err.to_string().contains("DATA_PVC"));
    }

    // =========================================================================
    // Phase inspection tests
    // =========================================================================

    fn pod_in_phase(phase: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn phase_of_maps_wire_strings() {
        assert_eq!(phase_of(&pod_in_phase("Pending")), PodPhase::Pending);
        assert_eq!(phase_of(&pod_in_phase("Running")), PodPhase::Running);
        assert_eq!(phase_of(&pod_in_phase("Succeeded")), PodPhase::Succeeded);
        assert_eq!(phase_of(&pod_in_phase("Failed")), PodPhase::Failed);
    }

    #[test]
    fn phase_of_tolerates_missing_or_novel_status() {
        assert_eq!(phase_of(&Pod::default()), PodPhase::Unknown);
        assert_eq!(phase_of(&pod_in_phase("Evicted")), PodPhase::Unknown);
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(PodPhase::Succeeded.is_terminal());
        assert!(PodPhase::Failed.is_terminal());
        assert!(!PodPhase::Pending.is_terminal());
        assert!(!PodPhase::Running.is_terminal());
        assert!(!PodPhase::Unknown.is_terminal());
    }
}
