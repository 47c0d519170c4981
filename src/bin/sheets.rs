use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::signal;

use college_connect::config::{AppConfig, STATUS_INTERVAL_SECS};
use college_connect::sheets::{SheetSync, SheetsClient};
use college_connect::store::{RemoteStore, RtdbStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    college_connect::init_tracing();

    let watch = env::args().skip(1).any(|arg| arg == "--watch");
    let config = AppConfig::from_env()?;
    let Some(spreadsheet_id) = config.spreadsheet_id.clone() else {
        bail!("GOOGLE_SHEET_ID is not set; cannot sync to a spreadsheet");
    };
    let Some(token) = config.sheets_token.clone() else {
        bail!("SHEETS_TOKEN is not set; cannot sync to a spreadsheet");
    };
    tracing::info!(
        component = "sheets",
        store_url = %config.redacted_store_url(),
        spreadsheet_id = %spreadsheet_id,
        watch = watch,
        "loaded configuration"
    );

    let store = RtdbStore::connect(&config).await?;
    let client = SheetsClient::new(spreadsheet_id, token);
    println!("Spreadsheet: {}", client.spreadsheet_url());
    let mut sync = SheetSync::new(client);

    let Some(directory) = store.read_once().await? else {
        tracing::warn!("remote collection is empty, nothing to sync");
        return Ok(());
    };
    sync.sync(&directory, if watch { "Initial Sync" } else { "Manual Sync" })
        .await?;

    if !watch {
        return Ok(());
    }

    let mut rx = store.subscribe();
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
                let Some(directory) = snapshot.data.filter(|d| !d.is_empty()) else {
                    tracing::warn!("remote collection is empty, skipping sync");
                    continue;
                };
                if let Err(err) = sync.sync(&directory, "Auto Sync").await {
                    tracing::error!(error = %err, "spreadsheet sync failed");
                }
            }
            _ = status.tick() => {
                match sync.last_synced_at() {
                    Some(at) => tracing::info!(
                        minutes_since_last_sync = (Utc::now() - at).num_minutes(),
                        "sheets sync alive, watching for changes"
                    ),
                    None => tracing::info!("sheets sync alive, no sync completed yet"),
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("sheets sync received shutdown signal");
                return Ok(());
            }
        }
    }
}
