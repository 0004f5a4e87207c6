// ABOUTME: Tracing setup: `RUST_LOG`-driven filter, human-readable output on stderr so
// ABOUTME: stdout stays reserved for `--output json|pretty|table` results.
use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
