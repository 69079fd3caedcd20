//! Application startup sequence
//!
//! Parse arguments, load the node description, start logging, launch the
//! workers and wait for a signal (or the configured run time) before shutting
//! everything down and logging final counters.

use crate::app::cli::{Args, NodeConfig, WorkerConfig, WorkerKind};
use crate::bus::QueueOptions;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version;
use crate::worker::{
    DemoBehaviour, FrameSource, FrameTally, NodeBuilder, WorkerBehaviour, WorkerReport,
    WorkerResult,
};

pub async fn startup() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse_from_env();

    let mut config = NodeConfig::load(args.config_file.as_deref()).await?;
    config.apply_args(&args);

    let use_color = config
        .color
        .unwrap_or_else(|| std::io::IsTerminal::is_terminal(&std::io::stderr()));
    init_logging(
        config.log_level.as_deref(),
        config.log_format.as_deref(),
        config.log_file.as_deref().and_then(|p| p.to_str()),
        use_color,
    )?;

    log::info!("{}", version::banner());
    log::debug!("node configuration: {:#?}", config);

    let (coordinator, shutdown_rx) = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    let builder = build_node(&config)?;
    let stop = coordinator.stop_signal();
    let node = tokio::task::spawn_blocking(move || builder.launch(stop)).await??;

    let reason = coordinator.wait(shutdown_rx, args.run_for()).await;
    log::info!("shutting down ({:?})", reason);

    let reports = tokio::task::spawn_blocking(move || node.shutdown()).await?;
    log_reports(&reports);

    Ok(())
}

/// Create every configured worker and wire its subscriptions
pub fn build_node(config: &NodeConfig) -> WorkerResult<NodeBuilder> {
    let mut builder = NodeBuilder::new();

    for worker in &config.workers {
        let options = QueueOptions {
            non_blocking: worker.non_blocking,
        };
        builder.add_worker(
            &worker.name,
            worker.queue_capacity,
            options,
            worker.loop_settings(config.wait_timeout),
            behaviour_for(worker),
        )?;
    }

    for worker in &config.workers {
        for source in &worker.subscribe_to {
            builder.subscribe(source, &worker.name)?;
        }
    }

    for name in builder.worker_names() {
        log::debug!(
            "worker '{}' publishes to {:?}",
            name,
            builder.destinations_of(name)?
        );
    }

    Ok(builder)
}

fn behaviour_for(worker: &WorkerConfig) -> Box<dyn WorkerBehaviour> {
    match worker.kind {
        WorkerKind::Demo => Box::new(DemoBehaviour::default()),
        WorkerKind::FrameSource if worker.frame_ids.is_empty() => {
            Box::new(FrameSource::default())
        }
        WorkerKind::FrameSource => Box::new(FrameSource::new(worker.frame_ids.clone())),
        WorkerKind::FrameTally => Box::new(FrameTally::new()),
    }
}

fn log_reports(reports: &[WorkerReport]) {
    for report in reports {
        let level = if report.clean_exit {
            log::Level::Info
        } else {
            log::Level::Error
        };
        log::log!(
            level,
            "[{:<5}] tx {} rx {} count {} overruns {} failed publishes {} | queue pushed {} popped {} dropped {} left {}",
            report.name,
            report.stats.num_tx,
            report.stats.num_rx,
            report.stats.count,
            report.stats.overruns_seen,
            report.stats.publish_failures,
            report.queue.pushed,
            report.queue.popped,
            report.queue.dropped,
            report.queue.len
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_node_fanout() {
        let builder = build_node(&NodeConfig::default()).unwrap();

        assert_eq!(builder.worker_names(), vec!["one", "two", "three"]);
        assert_eq!(builder.destinations_of("one").unwrap(), vec!["two", "three"]);
        assert_eq!(builder.destinations_of("two").unwrap(), vec!["one", "three"]);
        assert_eq!(builder.destinations_of("three").unwrap(), vec!["one"]);
    }

    #[test]
    fn test_frame_pipeline_from_config() {
        let config = NodeConfig::from_toml_str(
            r#"
            [[worker]]
            name = "can"
            kind = "frame-source"
            [[worker]]
            name = "delta"
            kind = "frame-tally"
            subscribe-to = "can"
            "#,
        )
        .unwrap();

        let builder = build_node(&config).unwrap();
        assert_eq!(builder.destinations_of("can").unwrap(), vec!["delta"]);
        assert!(builder.destinations_of("delta").unwrap().is_empty());
    }
}
