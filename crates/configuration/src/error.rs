use thiserror::Error;

/// Represents all possible errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Wraps errors from the `envy` crate when a required variable is missing
    /// or a present one fails to parse into its target type.
    #[error("failed to load settings from the environment: {0}")]
    Load(#[from] envy::Error),

    /// Occurs when configuration values fail validation after loading.
    #[error("configuration validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Creates a new validation error with a formatted message.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
}
