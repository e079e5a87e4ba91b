use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. `OCRLOAD_LOG`, then `RUST_LOG`, override the verbosity flag.
/// Logs go to stderr so stdout stays clean for `--output json`.
pub(crate) fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("OCRLOAD_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| EnvFilter::new(fallback),
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(fallback)),
        );

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {err}");
    }
}
