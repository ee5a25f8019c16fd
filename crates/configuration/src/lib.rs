//! # Zenith Configuration Crate
//!
//! Loads the application's runtime settings from the process environment
//! (optionally seeded from a `.env` file) and bootstraps structured logging.
//! Environment-variable configuration loading is this system's entire config
//! surface: there is no TOML file and no remote config service.

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

pub mod error;
pub mod settings;

pub use settings::Settings;

/// Loads a `.env` file if one is present (missing is not an error), then
/// deserializes `Settings` from the process environment via `envy`.
pub fn load_settings() -> Result<Settings, ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(?path, "loaded .env file"),
        Err(dotenvy::Error::Io(_)) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse .env file, continuing with process environment")
        }
    }

    let settings = envy::from_env::<Settings>()?;

    if settings.database_url.is_empty() {
        return Err(ConfigError::validation("DATABASE_URL must be set"));
    }
    if settings.symbol_list().is_empty() {
        return Err(ConfigError::validation("SYMBOLS must name at least one symbol"));
    }

    Ok(settings)
}

/// Initializes the global `tracing` subscriber from `settings.log_filter`,
/// falling back to the `RUST_LOG` environment variable and then `info`.
pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.clone()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
