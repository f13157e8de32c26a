//! Diagnostic logging to stderr. Progress for the user goes to stdout separately.

use tracing_subscriber::EnvFilter;

/// Initialize `tracing` output on stderr.
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown, or this
/// crate's debug events when `verbose` is on.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "warn,moodle_sync=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (tests, embedding) is not an error worth surfacing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
