//! Tracing setup shared by the binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// JSON lines on stdout (services)
    Stdout,
    /// JSON lines on stderr, keeping stdout free for interactive output
    Stderr,
}

/// Install the global JSON subscriber. `RUST_LOG` overrides `default_level`.
pub fn init(target: LogTarget, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match target {
        LogTarget::Stdout => registry.with(fmt::layer().json()).init(),
        LogTarget::Stderr => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}
