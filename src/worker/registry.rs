//! Worker thread registry
//!
//! Every worker runs on its own named OS thread. The registry keeps the join
//! handles so the node can wait for all of them at shutdown.

use crate::worker::error::{WorkerError, WorkerResult};
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    threads: Vec<(String, JoinHandle<()>)>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch `entry_point` on a new thread named after the worker
    pub fn spawn_worker<F>(&mut self, name: &str, entry_point: F) -> WorkerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(entry_point)
            .map_err(|source| WorkerError::Spawn {
                name: name.to_string(),
                source,
            })?;

        log::debug!("spawned worker thread '{}'", name);
        self.threads.push((name.to_string(), handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.threads.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Join every thread in spawn order. Returns the names of workers whose
    /// thread panicked.
    pub fn join_all(&mut self) -> Vec<String> {
        let mut panicked = Vec::new();
        for (name, handle) in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("worker '{}' panicked", name);
                panicked.push(name);
            } else {
                log::debug!("worker '{}' joined", name);
            }
        }
        panicked
    }
}
