//! Logging initialization, shared by every binary in the workspace.

/// Install a `tracing` subscriber reading level filters from `RUST_LOG`,
/// falling back to `default_filter` when unset.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}
