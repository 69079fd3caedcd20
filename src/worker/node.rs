//! Node assembly and lifecycle
//!
//! A [`NodeBuilder`] creates every worker's queue and wires every
//! subscription before a single thread exists. [`NodeBuilder::launch`] then
//! starts the threads behind a rendezvous sized for the workers plus the
//! launching thread, so it only returns once every worker is past startup.

use crate::bus::{Queue, QueueOptions, QueueStats, Rendezvous, WakeHandle};
use crate::core::shutdown::StopSignal;
use crate::core::time::{SystemTimeProvider, TimeProvider};
use crate::worker::behaviour::WorkerBehaviour;
use crate::worker::context::{LoopSettings, WorkerContext};
use crate::worker::error::{WorkerError, WorkerResult};
use crate::worker::message_loop;
use crate::worker::registry::WorkerRegistry;
use crate::worker::stats::{StatsSnapshot, WorkerStats};
use std::collections::HashMap;
use std::sync::Arc;

struct PendingWorker {
    context: WorkerContext,
    behaviour: Box<dyn WorkerBehaviour>,
}

#[derive(Default)]
pub struct NodeBuilder {
    workers: Vec<PendingWorker>,
    index: HashMap<String, usize>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a worker and its queue
    pub fn add_worker(
        &mut self,
        name: &str,
        queue_capacity: usize,
        options: QueueOptions,
        settings: LoopSettings,
        behaviour: Box<dyn WorkerBehaviour>,
    ) -> WorkerResult<()> {
        if self.index.contains_key(name) {
            return Err(WorkerError::DuplicateWorker {
                name: name.to_string(),
            });
        }

        let context = WorkerContext::new(name, queue_capacity, options, settings)?;
        self.index.insert(name.to_string(), self.workers.len());
        self.workers.push(PendingWorker { context, behaviour });
        Ok(())
    }

    /// Deliver everything `source` publishes to `subscriber`'s queue.
    ///
    /// Returns false when the subscription already existed.
    pub fn subscribe(&mut self, source: &str, subscriber: &str) -> WorkerResult<bool> {
        let subscriber_queue = Arc::clone(self.worker(subscriber)?.context.queue());
        let source_worker = self.worker(source)?;
        Ok(source_worker.context.add_subscriber(subscriber_queue))
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.context.name()).collect()
    }

    /// Names of the queues `source` publishes to
    pub fn destinations_of(&self, source: &str) -> WorkerResult<Vec<String>> {
        Ok(self.worker(source)?.context.destinations().names())
    }

    /// Start every worker with the system clock
    pub fn launch(self, stop: StopSignal) -> WorkerResult<Node> {
        self.launch_with_clock(stop, SystemTimeProvider)
    }

    /// Start every worker, returning once all of them have passed the
    /// startup rendezvous
    pub fn launch_with_clock<T>(self, stop: StopSignal, clock: T) -> WorkerResult<Node>
    where
        T: TimeProvider + Clone + 'static,
    {
        let barrier = Arc::new(Rendezvous::new(self.workers.len() + 1)?);
        let mut registry = WorkerRegistry::new();
        let mut handles = Vec::with_capacity(self.workers.len());

        for pending in self.workers {
            let PendingWorker {
                mut context,
                mut behaviour,
            } = pending;
            let name = context.name().to_string();
            handles.push(WorkerHandle {
                name: name.clone(),
                wake: context.wake().clone(),
                queue: Arc::clone(context.queue()),
                stats: Arc::clone(context.stats()),
            });

            let worker_barrier = Arc::clone(&barrier);
            let worker_stop = stop.clone();
            let worker_clock = clock.clone();
            let spawned = registry.spawn_worker(&name, move || {
                if let Err(e) = worker_barrier.wait() {
                    log::warn!("[{:<5}] startup abandoned: {}", context.name(), e);
                    return;
                }
                context.schedule_first_tx(worker_clock.now());
                message_loop::run(
                    &mut context,
                    behaviour.as_mut(),
                    &worker_clock,
                    &worker_stop,
                );
                if let Some(summary) = behaviour.summary() {
                    log::info!("[{:<5}] {}", context.name(), summary);
                }
            });

            if let Err(e) = spawned {
                log::error!("{}", e);
                barrier.cancel();
                stop.request_stop();
                registry.join_all();
                return Err(e);
            }
        }

        barrier.wait()?;
        barrier.destroy()?;
        log::info!("node started with {} workers", handles.len());

        Ok(Node {
            registry,
            workers: handles,
            stop,
        })
    }

    fn worker(&self, name: &str) -> WorkerResult<&PendingWorker> {
        self.index
            .get(name)
            .map(|&i| &self.workers[i])
            .ok_or_else(|| WorkerError::UnknownWorker {
                name: name.to_string(),
            })
    }
}

/// Main-thread view of one running worker
struct WorkerHandle {
    name: String,
    wake: WakeHandle,
    queue: Arc<Queue>,
    stats: Arc<WorkerStats>,
}

/// Final account of one worker after shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    pub stats: StatsSnapshot,
    pub queue: QueueStats,
    /// False when the worker's thread panicked
    pub clean_exit: bool,
}

/// A running set of workers
pub struct Node {
    registry: WorkerRegistry,
    workers: Vec<WorkerHandle>,
    stop: StopSignal,
}

impl Node {
    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.handle(name).map(|w| w.stats.snapshot())
    }

    pub fn queue_stats(&self, name: &str) -> Option<QueueStats> {
        self.handle(name).map(|w| w.queue.stats())
    }

    /// Stop every worker, wait for their threads and report final counters.
    ///
    /// Queues are closed before joining so a producer blocked on a full
    /// queue whose consumer has already left its loop gets released.
    pub fn shutdown(mut self) -> Vec<WorkerReport> {
        log::info!("stopping {} workers", self.workers.len());
        self.stop.request_stop();
        for worker in &self.workers {
            worker.queue.close();
            worker.wake.notify();
        }

        let panicked = self.registry.join_all();
        self.workers
            .iter()
            .map(|w| WorkerReport {
                name: w.name.clone(),
                stats: w.stats.snapshot(),
                queue: w.queue.stats(),
                clean_exit: !panicked.contains(&w.name),
            })
            .collect()
    }

    fn handle(&self, name: &str) -> Option<&WorkerHandle> {
        self.workers.iter().find(|w| w.name == name)
    }
}
