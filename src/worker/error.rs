//! Worker Error Types

use crate::bus::BusError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Worker '{name}' is already registered")]
    DuplicateWorker { name: String },

    #[error("Unknown worker: {name}")]
    UnknownWorker { name: String },

    #[error("Failed to spawn thread for worker '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for worker and node operations
pub type WorkerResult<T> = Result<T, WorkerError>;
