//! Bus Error Types

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Queue '{queue}' is full (capacity: {capacity})")]
    Full { queue: String, capacity: usize },

    #[error("Queue '{queue}' is busy, retry the operation")]
    WouldBlock { queue: String },

    #[error("Queue '{queue}' could not allocate {requested} bytes for the payload")]
    NoMemory { queue: String, requested: usize },

    #[error("Queue '{queue}' is closed")]
    Closed { queue: String },

    #[error("Free-on-pop payload cannot be published to {destinations} destinations")]
    OwnershipConflict { destinations: usize },

    #[error("Queue '{queue}' must have a capacity of at least 1")]
    InvalidCapacity { queue: String },

    #[error("Rendezvous needs at least one participant")]
    InvalidParticipants,

    #[error("Rendezvous cannot be destroyed while {waiting} participants are waiting")]
    BarrierBusy { waiting: usize },

    #[error("Rendezvous has been destroyed")]
    BarrierDestroyed,

    #[error("{message}")]
    Poisoned { message: String },

    #[error("Payload codec failure: {message}")]
    Codec { message: String },
}

impl BusError {
    /// The operation did not happen and may simply be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::WouldBlock { .. })
    }

    /// The payload was dropped and the queue's overrun indicator is set
    pub fn is_data_loss(&self) -> bool {
        matches!(self, BusError::Full { .. } | BusError::NoMemory { .. })
    }
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let full = BusError::Full {
            queue: "q".to_string(),
            capacity: 4,
        };
        let busy = BusError::WouldBlock {
            queue: "q".to_string(),
        };
        let nomem = BusError::NoMemory {
            queue: "q".to_string(),
            requested: 12,
        };

        assert!(full.is_data_loss());
        assert!(!full.is_retryable());
        assert!(busy.is_retryable());
        assert!(!busy.is_data_loss());
        assert!(nomem.is_data_loss());
        assert!(!BusError::BarrierDestroyed.is_data_loss());
    }

    #[test]
    fn test_error_messages_name_the_queue() {
        let full = BusError::Full {
            queue: "three".to_string(),
            capacity: 64,
        };
        assert_eq!(full.to_string(), "Queue 'three' is full (capacity: 64)");
    }
}
