use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown indicator type, late registration, unavailable provider or a bad
    /// parameter. Raised during setup and never recoverable by the engine.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An asynchronous indicator reported a failure. The run must stop.
    #[error("Indicator '{indicator}' failed: {message}")]
    Computation { indicator: String, message: String },

    #[error("A finish request is already pending")]
    FinishPending,

    #[error("Engine stopped before the request completed")]
    EngineClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
