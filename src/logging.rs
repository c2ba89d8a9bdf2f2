use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "linernotes=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `linernotes=info`. Later calls are no-ops, so embedding applications that
/// already installed a subscriber keep theirs.
pub fn init_tracing() {
    init_tracing_with_default(DEFAULT_FILTER);
}

pub fn init_tracing_with_default(default_filter: &str) {
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Tracing initialized");
    }
}
