use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no service configured with unit '{0}'")]
    UnknownService(String),

    #[error("no machine configured with name '{0}'")]
    UnknownMachine(String),
}
