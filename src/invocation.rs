//! Transcoder invocation capture and rewriting
//!
//! The launcher is installed in place of the PMS transcoder executable, so
//! its own argv and environment are the transcode command. Before that
//! command ships to the cluster, a fixed substitution table rewrites the
//! handful of arguments that reference the local server:
//!
//! - `-progressurl`, `-manifest_name`, `-segment_list`: the transcoder
//!   reports progress back to PMS through these URLs, which point at the
//!   loopback address of the machine PMS runs on. Inside a pod that address
//!   is the pod itself, so the first loopback occurrence in the following
//!   value is swapped for the in-cluster PMS address.
//! - `-loglevel`, `-loglevel_plex`: forced to `debug` so remote transcode
//!   logs are useful.
//!
//! Everything else passes through untouched.

use std::collections::BTreeMap;

/// Loopback address PMS writes into transcoder arguments
pub const PMS_LOOPBACK_ADDRESS: &str = "http://127.0.0.1:32400";

/// Log level forced onto remote transcoder runs
pub const FORCED_LOG_LEVEL: &str = "debug";

/// Flags whose following value carries a PMS callback URL
const ADDRESS_FLAGS: [&str; 3] = ["-progressurl", "-manifest_name", "-segment_list"];

/// Flags whose following value is a transcoder log level
const LOG_LEVEL_FLAGS: [&str; 2] = ["-loglevel", "-loglevel_plex"];

/// The command and environment one transcode run was invoked with
///
/// Captured once per process run and immutable after
/// [`rewrite`](Invocation::rewrite); the translated form is exactly what
/// the transcode pod executes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Ordered argument sequence, including argv[0] (the transcoder path,
    /// which is the same path inside the PMS image)
    pub args: Vec<String>,
    /// Environment variables by name
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    /// Create an invocation from an explicit argument list and environment
    pub fn new(args: Vec<String>, env: BTreeMap<String, String>) -> Self {
        Self { args, env }
    }

    /// Capture the current process's arguments and environment
    pub fn from_process() -> Self {
        Self::new(std::env::args().collect(), std::env::vars().collect())
    }

    /// Apply the substitution table, producing the translated invocation
    ///
    /// `internal_address` replaces the first loopback occurrence in values
    /// following the PMS callback flags.
    ///
    /// # Panics
    ///
    /// Panics with an out-of-bounds index if a recognized flag is the final
    /// argument. PMS always supplies a value after these flags; an
    /// invocation that doesn't is malformed and there is nothing sensible
    /// to launch from it.
    pub fn rewrite(mut self, internal_address: &str) -> Self {
        rewrite_args(&mut self.args, internal_address);
        rewrite_env(&mut self.env);
        self
    }
}

/// Rewrite the argument sequence in place
///
/// Scans positionally: wherever element `i` is a recognized flag, element
/// `i + 1` is rewritten. A value that was itself rewritten is still read
/// fresh when the scan reaches it, so rewritten values are never
/// reinterpreted as flags.
fn rewrite_args(args: &mut [String], internal_address: &str) {
    for i in 0..args.len() {
        if ADDRESS_FLAGS.contains(&args[i].as_str()) {
            args[i + 1] = args[i + 1].replacen(PMS_LOOPBACK_ADDRESS, internal_address, 1);
        } else if LOG_LEVEL_FLAGS.contains(&args[i].as_str()) {
            args[i + 1] = FORCED_LOG_LEVEL.to_string();
        }
    }
}

/// Rewrite the environment in place
///
/// The transcoder environment currently ships unchanged; this is the seam
/// for PMS-specific substitutions if any become necessary.
fn rewrite_env(_env: &mut BTreeMap<String, String>) {}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERNAL: &str = "http://pms-service.plex:32400";

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn progressurl_swaps_loopback_for_internal_address() {
        let mut a = args(&[
            "/transcoder",
            "-progressurl",
            "http://127.0.0.1:32400/video/:/transcode/session/abc/progress",
        ]);
        rewrite_args(&mut a, INTERNAL);
        assert_eq!(
            a[2],
            format!("{INTERNAL}/video/:/transcode/session/abc/progress")
        );
    }

    #[test]
    fn every_address_flag_is_rewritten() {
        for flag in ADDRESS_FLAGS {
            let mut a = args(&["/transcoder", flag, "http://127.0.0.1:32400/x"]);
            rewrite_args(&mut a, INTERNAL);
            assert_eq!(a[2], format!("{INTERNAL}/x"), "flag {flag}");
        }
    }

    #[test]
    fn only_the_first_loopback_occurrence_is_replaced() {
        let value = "http://127.0.0.1:32400/first?next=http://127.0.0.1:32400/second";
        let mut a = args(&["/transcoder", "-segment_list", value]);
        rewrite_args(&mut a, INTERNAL);
        assert_eq!(
            a[2],
            format!("{INTERNAL}/first?next=http://127.0.0.1:32400/second")
        );
    }

    #[test]
    fn log_level_flags_force_debug() {
        for flag in LOG_LEVEL_FLAGS {
            let mut a = args(&["/transcoder", flag, "error"]);
            rewrite_args(&mut a, INTERNAL);
            assert_eq!(a[2], FORCED_LOG_LEVEL, "flag {flag}");
        }
    }

    #[test]
    fn unrecognized_tokens_pass_through() {
        let mut a = args(&[
            "/transcoder",
            "-codec:0",
            "h264",
            "-other_url",
            "http://127.0.0.1:32400/leave-me",
        ]);
        let before = a.clone();
        rewrite_args(&mut a, INTERNAL);
        assert_eq!(a, before);
    }

    #[test]
    fn rewritten_values_are_not_reinterpreted_as_flags() {
        // -loglevel's value position happens to hold a flag token; after
        // being overwritten with "debug" it must not trigger a second rule.
        let mut a = args(&["-loglevel", "-progressurl", "http://127.0.0.1:32400/x"]);
        rewrite_args(&mut a, INTERNAL);
        assert_eq!(a, args(&["-loglevel", "debug", "http://127.0.0.1:32400/x"]));
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn flag_without_a_value_panics() {
        let mut a = args(&["/transcoder", "-progressurl"]);
        rewrite_args(&mut a, INTERNAL);
    }

    #[test]
    fn environment_passes_through_unchanged() {
        let env: BTreeMap<String, String> = [
            ("X_PLEX_TOKEN".to_string(), "secret".to_string()),
            ("HOME".to_string(), "/config".to_string()),
        ]
        .into();
        let invocation = Invocation::new(args(&["/transcoder"]), env.clone()).rewrite(INTERNAL);
        assert_eq!(invocation.env, env);
    }
}
