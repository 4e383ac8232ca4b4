//! Logging bootstrap
//!
//! Installs a `tracing` subscriber for applications embedding the client.
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use warden_domain::LoggingSettings;

/// Install the global subscriber described by `settings`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = match settings.format.to_ascii_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer().pretty().with_target(false).boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_target(false).boxed(),
    };

    let installed = tracing_subscriber::registry().with(filter).with(layer).try_init().is_ok();

    if installed {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            level = %settings.level,
            format = %settings.format,
            "Logging initialized"
        );
    }
    installed
}
