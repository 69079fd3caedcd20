//! Shutdown Coordination
//!
//! Signal handling for the node process plus the [`StopSignal`] that worker
//! threads poll between message-loop iterations. Worker threads are plain OS
//! threads, so the async side (signals, timers) only ever flips the shared
//! flag and broadcasts; it never joins anything itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Cooperative stop flag shared with worker threads
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Why the node stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    Elapsed,
}

/// Coordinates graceful shutdown across the application
pub struct ShutdownCoordinator {
    pub shutdown_tx: broadcast::Sender<()>,
    stop: StopSignal,
}

impl ShutdownCoordinator {
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);

        let coordinator = Self {
            shutdown_tx,
            stop: StopSignal::new(),
        };

        (coordinator, shutdown_rx)
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// The flag worker threads watch
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn trigger_shutdown(&self) {
        self.stop.request_stop();
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }

    /// Install handlers for SIGINT, SIGTERM, SIGHUP and SIGQUIT (Ctrl-C elsewhere).
    ///
    /// Must be called from inside a tokio runtime. A second signal exits the
    /// process immediately.
    pub fn install_signal_handlers(&self) {
        setup_signal_handlers(self.shutdown_tx.clone(), self.stop.clone());
    }

    /// Wait until shutdown is triggered or `run_for` elapses
    pub async fn wait(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
        run_for: Option<Duration>,
    ) -> ShutdownReason {
        if self.is_shutdown_requested() {
            return ShutdownReason::Signal;
        }

        match run_for {
            Some(limit) => {
                tokio::select! {
                    _ = shutdown_rx.recv() => ShutdownReason::Signal,
                    _ = tokio::time::sleep(limit) => {
                        self.trigger_shutdown();
                        ShutdownReason::Elapsed
                    }
                }
            }
            None => {
                let _ = shutdown_rx.recv().await;
                ShutdownReason::Signal
            }
        }
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>, stop: StopSignal) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use std::sync::atomic::AtomicUsize;
        use tokio::signal::unix::{signal, SignalKind};
        let signal_count = Arc::new(AtomicUsize::new(0));
        let signals = [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
            SignalKind::quit(),
        ];

        for kind in signals {
            let tx = shutdown_tx.clone();
            let stop = stop.clone();
            let sig_ctr = signal_count.clone();

            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    while sig.recv().await.is_some() {
                        let prev = sig_ctr.fetch_add(1, Ordering::AcqRel);
                        stop.request_stop();
                        let _ = tx.send(());
                        if prev >= 1 {
                            log::warn!("Second signal received; exiting");
                            std::process::exit(130);
                        }
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.request_stop();
                let _ = shutdown_tx.send(());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_stop_signal_is_shared() {
        let stop = StopSignal::new();
        let worker_view = stop.clone();

        assert!(!worker_view.is_stop_requested());
        stop.request_stop();
        assert!(worker_view.is_stop_requested());
    }

    #[tokio::test]
    async fn test_shutdown_coordinator_trigger() {
        let (coordinator, mut rx) = ShutdownCoordinator::new();
        let stop = coordinator.stop_signal();

        assert!(!coordinator.is_shutdown_requested());
        coordinator.trigger_shutdown();

        assert!(coordinator.is_shutdown_requested());
        assert!(stop.is_stop_requested());

        let signal_received = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(signal_received.is_ok(), "Should receive shutdown signal");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let (coordinator, _rx1) = ShutdownCoordinator::new();
        let mut rx2 = coordinator.subscribe();
        let mut rx3 = coordinator.subscribe();

        coordinator.trigger_shutdown();

        assert!(timeout(Duration::from_millis(100), rx2.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(100), rx3.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_elapsed_triggers_stop() {
        let (coordinator, rx) = ShutdownCoordinator::new();
        let stop = coordinator.stop_signal();

        let reason = coordinator.wait(rx, Some(Duration::from_millis(20))).await;

        assert_eq!(reason, ShutdownReason::Elapsed);
        assert!(stop.is_stop_requested());
    }

    #[tokio::test]
    async fn test_wait_returns_on_trigger() {
        let (coordinator, rx) = ShutdownCoordinator::new();
        let coordinator = Arc::new(coordinator);

        let trigger = Arc::clone(&coordinator);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger_shutdown();
        });

        let reason = timeout(
            Duration::from_secs(5),
            coordinator.wait(rx, Some(Duration::from_secs(60))),
        )
        .await
        .unwrap();
        assert_eq!(reason, ShutdownReason::Signal);
    }
}
