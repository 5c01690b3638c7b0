use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber. Filters come from `RUST_LOG`, defaulting to `info`.
///
/// Logs go to stderr so command output on stdout stays clean. Calling this
/// more than once is a no-op.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
