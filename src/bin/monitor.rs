use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use college_connect::backup::BackupManager;
use college_connect::config::{AppConfig, STATUS_INTERVAL_SECS};
use college_connect::monitor::{IntegrityMonitor, MonitorVerdict};
use college_connect::store::{RemoteStore, RtdbStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    college_connect::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "monitor",
        store_url = %config.redacted_store_url(),
        poll_seconds = config.store_poll_seconds,
        backups_dir = %config.backups_dir.display(),
        "loaded configuration"
    );

    let store = RtdbStore::connect(&config).await?;
    let backups = BackupManager::new(config.backups_dir.clone());
    let mut monitor = IntegrityMonitor::new(store.clone(), backups);
    let mut rx = store.subscribe();

    // Prime the tracked snapshot so the first change notification has a
    // baseline to diff against.
    let initial = store.read_once().await?;
    log_verdict(&monitor.observe(initial).await?);

    let mut status = tokio::time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    status.tick().await;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("store watch channel closed, exiting");
                    return Ok(());
                }
                let snapshot = rx.borrow_and_update().clone();
                match monitor.observe(snapshot.data).await {
                    Ok(verdict) => log_verdict(&verdict),
                    Err(err) => tracing::error!(error = %err, "monitor evaluation failed"),
                }
            }
            _ = status.tick() => {
                tracing::info!("monitor alive, watching for changes");
            }
            _ = signal::ctrl_c() => {
                tracing::info!("monitor received shutdown signal");
                return Ok(());
            }
        }
    }
}

fn log_verdict(verdict: &MonitorVerdict) {
    match verdict {
        MonitorVerdict::EmptyIdle => {
            tracing::warn!("collection is empty and no snapshot is available to restore");
        }
        MonitorVerdict::EmptyRestored { restored } => {
            tracing::warn!(
                colleges = restored.colleges,
                students = restored.students,
                "collection went empty, last snapshot restored"
            );
        }
        MonitorVerdict::EmptySkipped => {
            tracing::warn!("collection still empty, restore already attempted this incident");
        }
        MonitorVerdict::DataLoss {
            before,
            after,
            emergency_file,
        } => {
            tracing::error!(
                students_before = before.students,
                students_after = after.students,
                colleges_before = before.colleges,
                colleges_after = after.colleges,
                file = %emergency_file.display(),
                "DATA LOSS detected, emergency backup written"
            );
        }
        MonitorVerdict::Decreased { before, after } => {
            tracing::warn!(
                students_before = before.students,
                students_after = after.students,
                "counts decreased within normal bounds"
            );
        }
        MonitorVerdict::Increased { after, .. } => {
            tracing::info!(
                colleges = after.colleges,
                students = after.students,
                "collection grew"
            );
        }
        MonitorVerdict::Healthy { stats } => {
            tracing::info!(
                colleges = stats.colleges,
                students = stats.students,
                companies = stats.companies,
                "collection healthy"
            );
        }
    }
}
