use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the process-wide subscriber: JSON lines on stdout, filtered by
/// `RUST_LOG`. Later calls are no-ops, so test binaries can call it freely.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().json())
        .try_init();
}
