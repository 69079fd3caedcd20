//! Tests running real worker threads through a launched node

#[cfg(test)]
mod tests {
    use crate::bus::{Element, Outgoing, QueueOptions};
    use crate::core::shutdown::StopSignal;
    use crate::core::time::{MockTimeProvider, TimeProvider};
    use crate::worker::{
        DemoBehaviour, DemoMessage, FrameSource, FrameTally, LoopSettings, Node, NodeBuilder,
        TxSchedule, WorkerBehaviour,
    };
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Keeps every decoded demo message where the test can read it
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<DemoMessage>>>,
    }

    impl WorkerBehaviour for Recorder {
        fn on_message(&mut self, _worker: &str, element: Element) {
            let message = element.decode::<DemoMessage>().unwrap();
            self.seen.lock().unwrap().push(message);
        }

        fn produce(
            &mut self,
            _worker: &str,
            _count: u64,
            _clock: &dyn TimeProvider,
        ) -> Option<Outgoing<'static>> {
            None
        }
    }

    /// Spends a long time in every transmit, like a blocking serial write
    struct SlowWriter;

    impl WorkerBehaviour for SlowWriter {
        fn on_message(&mut self, _worker: &str, _element: Element) {}

        fn produce(
            &mut self,
            _worker: &str,
            _count: u64,
            _clock: &dyn TimeProvider,
        ) -> Option<Outgoing<'static>> {
            thread::sleep(Duration::from_millis(300));
            None
        }
    }

    fn wait_for(node: &Node, worker: &str, num_rx: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if node.stats(worker).is_some_and(|s| s.num_rx >= num_rx) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn once() -> LoopSettings {
        // The mock clock never advances, so a fixed schedule fires exactly once
        LoopSettings {
            wait_timeout: Duration::from_millis(10),
            schedule: TxSchedule::Fixed {
                interval: Duration::from_secs(3600),
            },
            initial_delay: Duration::ZERO,
        }
    }

    fn listen_only() -> LoopSettings {
        LoopSettings {
            wait_timeout: Duration::from_millis(10),
            schedule: TxSchedule::Never,
            initial_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_single_message_from_a_to_b() {
        let mut builder = NodeBuilder::new();
        builder
            .add_worker(
                "A",
                64,
                QueueOptions::default(),
                once(),
                Box::new(DemoBehaviour::default()),
            )
            .unwrap();
        let recorder = Recorder::default();
        builder
            .add_worker(
                "B",
                64,
                QueueOptions::default(),
                listen_only(),
                Box::new(recorder.clone()),
            )
            .unwrap();
        builder.subscribe("A", "B").unwrap();

        let node = builder
            .launch_with_clock(StopSignal::new(), MockTimeProvider::new())
            .unwrap();
        assert!(wait_for(&node, "B", 1), "B never received A's message");

        let reports = node.shutdown();
        let a = reports.iter().find(|r| r.name == "A").unwrap();
        let b = reports.iter().find(|r| r.name == "B").unwrap();

        assert_eq!(a.stats.num_tx, 1);
        assert_eq!(a.stats.count, 1);
        assert_eq!(b.stats.num_rx, 1);
        assert_eq!(b.queue.pushed, 1);
        assert_eq!(b.queue.len, 0);
        assert!(a.clean_exit && b.clean_exit);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![DemoMessage {
                name: "A".to_string(),
                count: 0,
                text: "hello".to_string(),
            }]
        );
    }

    #[test]
    fn test_frames_reach_tally() {
        let mut builder = NodeBuilder::new();
        builder
            .add_worker(
                "can",
                8,
                QueueOptions::non_blocking(),
                once(),
                Box::new(FrameSource::default()),
            )
            .unwrap();
        builder
            .add_worker(
                "delta",
                64,
                QueueOptions::default(),
                listen_only(),
                Box::new(FrameTally::new()),
            )
            .unwrap();
        builder.subscribe("can", "delta").unwrap();

        let node = builder
            .launch_with_clock(StopSignal::new(), MockTimeProvider::new())
            .unwrap();
        assert!(wait_for(&node, "delta", 1));

        let reports = node.shutdown();
        assert!(reports.iter().all(|r| r.clean_exit));
        assert_eq!(node_stat(&reports, "delta"), 1);
    }

    #[test]
    fn test_shutdown_stops_idle_workers_promptly() {
        let mut builder = NodeBuilder::new();
        for name in ["one", "two", "three"] {
            builder
                .add_worker(
                    name,
                    4,
                    QueueOptions::default(),
                    LoopSettings {
                        wait_timeout: Duration::from_secs(30),
                        ..listen_only()
                    },
                    Box::new(DemoBehaviour::default()),
                )
                .unwrap();
        }

        let node = builder.launch(StopSignal::new()).unwrap();
        assert_eq!(node.worker_names(), vec!["one", "two", "three"]);

        // Shutdown wakes every worker instead of waiting out the long timeout
        let started = Instant::now();
        let reports = node.shutdown();
        assert_eq!(reports.len(), 3);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_shutdown_releases_producer_blocked_on_full_queue() {
        let mut builder = NodeBuilder::new();
        let every_ms = LoopSettings {
            wait_timeout: Duration::from_millis(10),
            schedule: TxSchedule::Fixed {
                interval: Duration::from_millis(1),
            },
            initial_delay: Duration::ZERO,
        };
        builder
            .add_worker(
                "prod",
                4,
                QueueOptions::blocking(),
                every_ms,
                Box::new(DemoBehaviour::default()),
            )
            .unwrap();
        builder
            .add_worker(
                "slow",
                1,
                QueueOptions::blocking(),
                every_ms,
                Box::new(SlowWriter),
            )
            .unwrap();
        builder.subscribe("prod", "slow").unwrap();

        let node = builder.launch(StopSignal::new()).unwrap();
        // Let "prod" fill the queue while "slow" is stuck in its transmit
        thread::sleep(Duration::from_millis(150));

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = done_tx.send(node.shutdown());
        });
        let reports = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("shutdown did not finish");

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.clean_exit));
        let slow = reports.iter().find(|r| r.name == "slow").unwrap();
        assert!(slow.queue.len <= 1);
    }

    fn node_stat(reports: &[crate::worker::WorkerReport], name: &str) -> u64 {
        reports
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.stats.num_rx)
            .unwrap_or(0)
    }
}
