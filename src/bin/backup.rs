use std::env;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use college_connect::backup::BackupManager;
use college_connect::config::AppConfig;
use college_connect::models::DirectoryStats;
use college_connect::store::{RemoteStore, RtdbStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    college_connect::init_tracing();

    let repeat = env::args().skip(1).any(|arg| arg == "--loop");
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "backup",
        store_url = %config.redacted_store_url(),
        backups_dir = %config.backups_dir.display(),
        interval_seconds = config.backup_interval_seconds,
        "loaded configuration"
    );

    // Fails fast here when the store rejects our credentials.
    let store = RtdbStore::connect(&config).await?;
    let backups = BackupManager::new(config.backups_dir.clone());

    if !repeat {
        run_backup(store.as_ref(), &backups).await?;
        return Ok(());
    }

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.backup_interval_seconds));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = run_backup(store.as_ref(), &backups).await {
                    tracing::error!(error = %err, "backup run failed");
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("backup loop received shutdown signal");
                return Ok(());
            }
        }
    }
}

async fn run_backup(store: &dyn RemoteStore, backups: &BackupManager) -> Result<()> {
    let Some(directory) = store.read_once().await? else {
        tracing::warn!("remote collection is empty, skipping backup");
        return Ok(());
    };
    let Some(path) = backups.create_backup(&directory)? else {
        tracing::warn!("empty snapshot, skipping backup");
        return Ok(());
    };
    let stats = DirectoryStats::of(&directory);
    tracing::info!(
        file = %path.display(),
        colleges = stats.colleges,
        students = stats.students,
        companies = stats.companies,
        "backup written"
    );
    Ok(())
}
