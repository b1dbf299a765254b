use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedisFacadeError {
    #[error("No driver registered for identifier `{identifier}`")]
    MissingDriver { identifier: String },

    #[error("Query logging requested but no logger is available: {0}")]
    MissingLogger(String),

    #[error("No driver has been resolved or set on this connection")]
    DriverUnresolved,

    #[cfg(feature = "redis")]
    #[error(transparent)]
    RedisError(#[from] ::redis::RedisError),

    #[error("Command error: {0}")]
    CommandError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl RedisFacadeError {
    pub(crate) fn missing_driver(identifier: impl Into<String>) -> Self {
        RedisFacadeError::MissingDriver {
            identifier: identifier.into(),
        }
    }
}

impl From<serde_json::Error> for RedisFacadeError {
    fn from(err: serde_json::Error) -> Self {
        RedisFacadeError::ConfigError(format!("invalid JSON configuration: {err}"))
    }
}

pub type Result<T, E = RedisFacadeError> = std::result::Result<T, E>;
