//! Fanout publishing to a list of destination queues
//!
//! A worker's subscribers are recorded in its [`Destinations`]. Publishing
//! pushes the same payload to every destination in subscription order and
//! keeps going past individual failures. Delivery is best effort, not
//! transactional: successful pushes are never rolled back.

use crate::bus::element::{Outgoing, Ownership};
use crate::bus::error::{BusError, BusResult};
use crate::bus::queue::Queue;
use std::sync::{Arc, PoisonError, RwLock};

/// Per-destination outcome of one fanout
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Destinations that accepted the payload, in attempt order
    pub delivered: Vec<String>,
    /// Destinations that rejected it, with the reason
    pub failed: Vec<(String, BusError)>,
}

impl PublishReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some destinations received the payload and some did not
    pub fn is_partial(&self) -> bool {
        !self.delivered.is_empty() && !self.failed.is_empty()
    }

    /// `Ok` when every push succeeded, otherwise the last failure encountered
    pub fn into_result(self) -> BusResult<()> {
        match self.failed.into_iter().last() {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }
}

/// Push `message` to every queue in `queues`, recording each outcome.
///
/// Free-on-pop payloads may only go to a single destination; with more than
/// one the fanout is refused before anything is pushed.
pub fn publish_with_report(queues: &[Arc<Queue>], message: Outgoing<'_>) -> PublishReport {
    let mut report = PublishReport::default();

    if message.ownership() == Ownership::FreeOnPop {
        match queues {
            [] => {}
            [queue] => match queue.push(message) {
                Ok(()) => report.delivered.push(queue.name().to_string()),
                Err(error) => report.failed.push((queue.name().to_string(), error)),
            },
            _ => {
                for queue in queues {
                    report.failed.push((
                        queue.name().to_string(),
                        BusError::OwnershipConflict {
                            destinations: queues.len(),
                        },
                    ));
                }
            }
        }
        return report;
    }

    for queue in queues {
        match queue.push(message.as_copy()) {
            Ok(()) => report.delivered.push(queue.name().to_string()),
            Err(error) => {
                log::trace!("publish to '{}' failed: {}", queue.name(), error);
                report.failed.push((queue.name().to_string(), error));
            }
        }
    }

    report
}

/// Push `message` to every queue in `queues`.
///
/// Returns `Ok` only if every push succeeded; otherwise the last error.
pub fn publish(queues: &[Arc<Queue>], message: Outgoing<'_>) -> BusResult<()> {
    publish_with_report(queues, message).into_result()
}

/// Ordered, duplicate-free list of queues a worker fans out to
///
/// Subscriptions are normally made during startup. Publishing works on a
/// snapshot of the list, so a late subscription never blocks a publish.
#[derive(Debug, Default)]
pub struct Destinations {
    queues: RwLock<Vec<Arc<Queue>>>,
}

impl Destinations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `queue` as a destination. Returns false if it was already present.
    pub fn subscribe(&self, queue: Arc<Queue>) -> bool {
        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        if queues.iter().any(|existing| Arc::ptr_eq(existing, &queue)) {
            return false;
        }
        queues.push(queue);
        true
    }

    pub fn len(&self) -> usize {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the destination queues in publish order
    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|queue| queue.name().to_string())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Arc<Queue>> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish(&self, message: Outgoing<'_>) -> BusResult<()> {
        publish(&self.snapshot(), message)
    }

    pub fn publish_with_report(&self, message: Outgoing<'_>) -> PublishReport {
        publish_with_report(&self.snapshot(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::queue::QueueOptions;

    fn queue(name: &str) -> Arc<Queue> {
        Arc::new(Queue::new(name, 4, QueueOptions::default()).unwrap())
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let destinations = Destinations::new();
        let q = queue("two");

        assert!(destinations.subscribe(Arc::clone(&q)));
        assert!(!destinations.subscribe(Arc::clone(&q)));
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations.names(), vec!["two".to_string()]);
    }

    #[test]
    fn test_queues_with_same_name_are_distinct_destinations() {
        let destinations = Destinations::new();

        assert!(destinations.subscribe(queue("dup")));
        assert!(destinations.subscribe(queue("dup")));
        assert_eq!(destinations.len(), 2);
    }

    #[test]
    fn test_publish_to_empty_list_succeeds() {
        let destinations = Destinations::new();
        assert!(destinations.is_empty());
        assert!(destinations.publish(Outgoing::copy(b"nobody")).is_ok());
    }

    #[test]
    fn test_report_classification() {
        let mut report = PublishReport::default();
        assert!(report.is_complete());
        assert!(!report.is_partial());

        report.delivered.push("a".to_string());
        report.failed.push((
            "b".to_string(),
            BusError::WouldBlock {
                queue: "b".to_string(),
            },
        ));
        assert_eq!(report.attempted(), 2);
        assert!(report.is_partial());
        assert!(report.into_result().unwrap_err().is_retryable());
    }
}
