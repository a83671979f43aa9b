//! pms-elastic-transcoder - runs Plex Media Server transcodes as pods on a
//! Kubernetes cluster
//!
//! The binary is installed inside the PMS container in place of the Plex
//! transcoder. When PMS starts a transcode it actually starts this
//! launcher, which ships the real transcoder invocation to the cluster as
//! a one-shot pod, watches it to completion, and removes it. PMS keeps
//! talking to what it believes is a local transcoder; the work happens on
//! whatever node the scheduler picked.
//!
//! One process invocation handles exactly one transcode:
//! capture and rewrite the invocation, build the pod, submit it, poll its
//! phase once a second until it succeeds or fails (or PMS kills us, which
//! becomes a cancellation), then delete the pod.
//!
//! # Modules
//!
//! - [`config`] - Environment-derived settings (namespace, PVCs, image)
//! - [`invocation`] - Transcoder argv/env capture and rewriting
//! - [`pod`] - Transcode pod construction and phase inspection
//! - [`gateway`] - Pod create/get/delete against the API server
//! - [`launcher`] - Submission, observation, cancellation, cleanup
//! - [`shutdown`] - Host signals as a cancellation future
//! - [`error`] - Error types for the launcher

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod invocation;
pub mod launcher;
pub mod pod;
pub mod shutdown;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
