use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence. Without it the level is `warn`, or `debug`
/// for this crate when `verbose` is set. Events go to stderr so they never mix
/// with piped stdout.
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "warn,queryprobe=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
