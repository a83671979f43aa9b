//! Transcode run lifecycle
//!
//! Drives a single transcode run end to end:
//!
//! 1. Submit the built pod through the gateway.
//! 2. Observe its phase once a second until it reaches Succeeded or
//!    Failed, racing the observation against external cancellation.
//! 3. Remove the pod exactly once, on every path that holds a handle.
//!
//! The race is a plain `select!` over the observation future and the
//! cancellation future. Whichever loses is dropped, so a cancelled run
//! issues no further phase reads and a late observation result is never
//! acted on.

use std::future::Future;
use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::gateway::{PodGateway, PodHandle};
use crate::pod::PodPhase;
use crate::Result;

/// Pause between phase reads
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a transcode run ended when it didn't end in an error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The pod reached `Succeeded`
    Completed,
    /// Cancellation won the race and the pod was removed mid-flight
    Cancelled,
}

/// Sees one transcode pod through submission, observation, and removal
pub struct TranscodeLauncher<G> {
    gateway: G,
}

impl<G: PodGateway> TranscodeLauncher<G> {
    /// Create a launcher over the given gateway
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Run `pod` to completion.
    ///
    /// `cancel` resolves when the host environment requests shutdown.
    /// Every path that obtains a handle removes the pod exactly once
    /// before returning; if that removal itself fails, its error is the
    /// one returned and any run error is logged instead, since a leaked
    /// pod on a shared cluster outranks a lost transcode.
    ///
    /// A submission failure returns before any observation or removal;
    /// with no handle there is nothing to delete.
    pub async fn run(&self, pod: &Pod, cancel: impl Future<Output = ()>) -> Result<RunOutcome> {
        let handle = self.gateway.submit(pod).await?;

        let observed = tokio::select! {
            result = observe(&self.gateway, &handle) => Some(result),
            () = cancel => {
                info!(pod = %handle.name, "Cancellation requested, abandoning observation");
                None
            }
        };

        let decision = match observed {
            Some(Ok(PodPhase::Succeeded)) => {
                info!(pod = %handle.name, "Transcode pod succeeded");
                Ok(RunOutcome::Completed)
            }
            Some(Ok(PodPhase::Failed)) => {
                warn!(pod = %handle.name, "Transcode pod failed");
                Err(Error::TranscodeFailed {
                    pod: handle.name.clone(),
                })
            }
            Some(Ok(phase)) => Err(Error::internal(format!(
                "observation ended on non-terminal phase {phase}"
            ))),
            Some(Err(err)) => {
                error!(pod = %handle.name, error = %err, "Observation failed");
                Err(err)
            }
            None => Ok(RunOutcome::Cancelled),
        };

        info!(pod = %handle.name, "Cleaning up transcode pod");
        match (decision, self.gateway.remove(&handle).await) {
            (decision, Ok(())) => decision,
            (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
            (Err(run_err), Err(cleanup_err)) => {
                error!(error = %run_err, "Run error preceding cleanup failure");
                Err(cleanup_err)
            }
        }
    }
}

/// Watch the pod until it reaches a terminal phase.
///
/// Consumes the interval-paced phase stream; `Unknown` is logged and
/// skipped since the cluster may recover visibility, while a transport
/// error ends the run with its cause.
async fn observe<G: PodGateway>(gateway: &G, handle: &PodHandle) -> Result<PodPhase> {
    let phases = phase_stream(gateway, handle);
    tokio::pin!(phases);
    while let Some(result) = phases.next().await {
        let phase = result?;
        if phase.is_terminal() {
            return Ok(phase);
        }
        if phase == PodPhase::Unknown {
            warn!(pod = %handle.name, "Pod phase unknown, continuing to observe");
        }
    }
    Err(Error::internal("phase stream ended unexpectedly"))
}

/// Lazy, interval-paced stream of phase observations
///
/// Each pull waits for the next one-second tick and then reads the phase
/// fresh. The first tick fires immediately. A read that overruns the
/// period delays the following ticks rather than letting the missed ones
/// fire back-to-back. Dropping the stream stops the polling; nothing runs
/// between pulls.
fn phase_stream<'a, G: PodGateway>(
    gateway: &'a G,
    handle: &'a PodHandle,
) -> impl Stream<Item = Result<PodPhase>> + 'a {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stream::unfold(ticker, move |mut ticker| async move {
        ticker.tick().await;
        Some((gateway.phase(handle).await, ticker))
    })
}
