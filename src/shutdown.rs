//! Host shutdown signals as a cancellation future
//!
//! PMS stops a transcode by killing the transcoder process, which for us
//! arrives as SIGINT or SIGTERM. The first signal resolves the returned
//! future so the run can be cancelled and the pod removed; a second signal
//! while that cleanup is still underway exits immediately, accepting a
//! possibly leaked pod over a process that will not die.

use std::future::Future;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::error::Error;
use crate::Result;

/// Register SIGINT and SIGTERM handlers and return the cancellation future.
///
/// Registration happens eagerly so a failure surfaces at startup, before
/// anything is submitted to the cluster.
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::internal(format!("failed to register SIGTERM handler: {e}")))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::internal(format!("failed to register SIGINT handler: {e}")))?;

    Ok(async move {
        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!(signal = received, "Shutdown signal received, cancelling transcode");

        // Keep listening so an impatient second signal still works.
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
            warn!("Second shutdown signal, exiting without finishing cleanup");
            std::process::exit(1);
        });
    })
}
