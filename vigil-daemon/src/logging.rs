//! Logging initialization for vigil-daemon.
//!
//! Builds the `tracing-subscriber` stack from the `[general]` section of
//! `VigilConfig`: an `EnvFilter` (overridable via `RUST_LOG`) plus a
//! format layer chosen by the validated [`LogFormat`].

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vigil_core::config::{GeneralConfig, LogFormat};

/// Default filter directives derived from the configured level.
///
/// The level applies to the vigil crates; the HTTP stack under the
/// diagnosis client is pinned to `warn` so connection and polling
/// internals do not drown out incident logs at `debug`.
fn default_directives(level: &str) -> String {
    format!("{level},hyper=warn,reqwest=warn")
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format()? {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    }
    .context("failed to initialize tracing subscriber")
}
