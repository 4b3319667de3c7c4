use thiserror::Error;

/// Errors returned by the registry and the dispatcher.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("unknown engine {0:?} (forgotten register?)")]
    UnknownEngine(String),

    #[error("engine {0:?} is not active")]
    EngineNotActive(String),

    #[error("engine {0:?} is already registered")]
    DuplicateEngine(String),

    #[error("failed initializing engine {name:?}: {reason:#}")]
    EngineInit { name: String, reason: eyre::Report },

    #[error("logger has been closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LogError>;
