use anyhow::Result;
use log::{error, info, warn};
use seat_monitor::analytics::ProcessDetector;
use seat_monitor::capture::GstreamerSourceFactory;
use seat_monitor::config::{self, Config};
use seat_monitor::db::models::{Store, SystemLogEntry};
use seat_monitor::db::{DatabaseService, MemoryPersistence, Persistence};
use seat_monitor::shutdown::install_signal_handler;
use seat_monitor::worker::{WorkerContext, WorkerState, WorkerSupervisor};
use seat_monitor::zones::{ZoneCache, ZoneRepository};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn load() -> Result<Config> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = config::load_config(path.as_deref())?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

async fn persistence(config: &Config) -> Result<Arc<dyn Persistence>> {
    if config.dry_run {
        warn!("Dry run: occupancy and events are kept in memory only");
        let memory = MemoryPersistence::new();
        memory.insert_store(Store::new(&config.store.id));
        return Ok(Arc::new(memory));
    }

    let db = DatabaseService::new(&config.database).await?;
    if !db.health_check().await? {
        warn!("Database health check failed, continuing");
    }
    Ok(Arc::new(db.persistence()))
}

async fn log_system(persistence: &Arc<dyn Persistence>, entry: SystemLogEntry) {
    if let Err(e) = persistence.log_system_event(&entry).await {
        warn!("Failed to write system log: {}", e);
    }
}

async fn run_app() -> Result<()> {
    let config = load()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();
    info!("Starting seat monitor for store {}", config.store.id);

    let sources = Arc::new(GstreamerSourceFactory::new(Duration::from_secs(
        config.stream.read_timeout_secs,
    ))?);
    info!("GStreamer initialized successfully");

    let persistence = persistence(&config).await?;

    let zones = Arc::new(ZoneRepository::new(
        persistence.clone(),
        Arc::new(ZoneCache::new(Duration::from_secs(config.zone_cache.ttl_secs))),
        config.zone_cache.snapshot_dir.clone(),
    ));

    let ctx = WorkerContext {
        persistence: persistence.clone(),
        zones,
        detector: Arc::new(ProcessDetector::new(&config.detection)),
        sources,
        belongings: None,
    };

    // Signals during the staggered start already stop the workers
    let shutdown = install_signal_handler();
    let mut supervisor =
        WorkerSupervisor::new(config.clone(), ctx).with_cancel_token(shutdown.clone());
    let channels = supervisor.start().await?;
    if channels.is_empty() {
        warn!("No channels to monitor, exiting");
        return Ok(());
    }

    log_system(
        &persistence,
        SystemLogEntry::info(&config.store.id, "supervisor", "Service started").with_metadata(
            json!({
                "channels": channels,
                "polling_interval": config.detection.polling_interval_secs,
            }),
        ),
    )
    .await;

    tokio::select! {
        _ = shutdown.cancelled() => info!("Shutting down..."),
        _ = supervisor.wait() => warn!("All workers ended on their own"),
    }

    let reports = supervisor.stop().await;
    let failed = reports
        .iter()
        .filter(|r| r.state == WorkerState::Failed)
        .count();
    for report in &reports {
        info!(
            "Channel {}: {} after {} frames ({} events logged, {} errors)",
            report.channel_id,
            report.state,
            report.frames_processed,
            report.events.total_logged,
            report.performance.error_count
        );
    }

    log_system(
        &persistence,
        SystemLogEntry::info(&config.store.id, "supervisor", "Service stopped").with_metadata(
            json!({
                "workers": reports.len(),
                "failed": failed,
            }),
        ),
    )
    .await;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        error!("Application error: {:#}", e);
        eprintln!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
