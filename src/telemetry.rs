//! Logging setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr `fmt` subscriber filtered by RUST_LOG, or `default_level`.
///
/// Returns false when a global subscriber was already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

/// Describe a secret for logs without revealing it
pub(crate) fn redact(secret: &str) -> String {
    format!("<{} chars>", secret.chars().count())
}
