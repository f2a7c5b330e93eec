use thiserror::Error;

/// Errors raised by the scheduler's lifecycle and configuration layer.
///
/// Job outcomes are never reported through this type; they surface as
/// [`JobResult`](crate::JobResult) values from `wait` and `get_result`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("job scheduler is already initialised")]
    AlreadyInitialised,

    #[error("job scheduler is not initialised")]
    NotInitialised,

    #[error("job scheduler has already been shut down")]
    AlreadyShutDown,

    #[error("shutdown cannot be requested from one of the scheduler's own workers")]
    ShutdownFromWorker,
}
