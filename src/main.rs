//! Transcode launcher - stands in for the Plex transcoder and delegates the
//! real work to a Kubernetes pod

use kube::Client;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pms_elastic_transcoder::config::Config;
use pms_elastic_transcoder::gateway::KubePodGateway;
use pms_elastic_transcoder::invocation::Invocation;
use pms_elastic_transcoder::launcher::{RunOutcome, TranscodeLauncher};
use pms_elastic_transcoder::pod::build_transcode_pod;
use pms_elastic_transcoder::shutdown::shutdown_signal;
use pms_elastic_transcoder::Error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let invocation = Invocation::from_process().rewrite(&config.pms_internal_address);
    debug!(args = ?invocation.args, "Rewritten transcoder invocation");

    // PMS starts the transcoder inside the session directory; the pod runs
    // from the same path so relative segment paths keep working.
    let working_dir = std::env::current_dir().map_err(|source| Error::WorkingDir { source })?;
    let pod = build_transcode_pod(&config, &invocation, &working_dir.to_string_lossy())?;

    let client = Client::try_default()
        .await
        .map_err(|source| Error::ClientInit { source })?;
    let gateway = KubePodGateway::new(client, &config.namespace);
    let cancel = shutdown_signal()?;

    info!(
        namespace = %config.namespace,
        image = %config.pms_image,
        "Launching transcode on the cluster"
    );

    match TranscodeLauncher::new(gateway).run(&pod, cancel).await {
        Ok(RunOutcome::Completed) => {
            info!("Transcode complete");
            Ok(())
        }
        Ok(RunOutcome::Cancelled) => {
            info!("Transcode cancelled, pod removed");
            Ok(())
        }
        Err(err) => {
            if err.may_leak_pod() {
                error!(error = %err, "Cleanup failed, a transcode pod may be left on the cluster");
            }
            Err(err.into())
        }
    }
}
