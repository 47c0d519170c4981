use std::io::{self, BufRead, Write};

use anyhow::Result;

use college_connect::backup::BackupManager;
use college_connect::config::AppConfig;
use college_connect::models::DirectoryStats;
use college_connect::store::{RemoteStore, RtdbStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    college_connect::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "restore",
        store_url = %config.redacted_store_url(),
        backups_dir = %config.backups_dir.display(),
        "loaded configuration"
    );

    let store = RtdbStore::connect(&config).await?;
    let backups = BackupManager::new(config.backups_dir.clone());

    let entries = backups.list_backups()?;
    if entries.is_empty() {
        println!("No backups found in {}.", backups.dir().display());
        return Ok(());
    }

    println!("Available backups (newest first):");
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "  {}. {} — {} colleges, {} students, {} companies ({})",
            index + 1,
            entry.file_name,
            entry.stats.colleges,
            entry.stats.students,
            entry.stats.companies,
            entry.timestamp.to_rfc3339(),
        );
    }

    let selection = prompt("Select a backup to restore (number, or 'cancel'): ")?;
    if selection.eq_ignore_ascii_case("cancel") {
        println!("Restore cancelled.");
        return Ok(());
    }
    let index: usize = match selection.parse::<usize>() {
        Ok(n) if (1..=entries.len()).contains(&n) => n - 1,
        _ => {
            eprintln!("Invalid selection: {selection}");
            std::process::exit(1);
        }
    };
    let entry = &entries[index];
    let backup = backups.load_backup(&entry.file_name)?;

    println!(
        "About to restore {} ({} colleges, {} students, {} companies).",
        entry.file_name, backup.stats.colleges, backup.stats.students, backup.stats.companies,
    );
    println!("This OVERWRITES the entire remote collection.");
    let confirmation = prompt("Type RESTORE to confirm: ")?;
    if confirmation != "RESTORE" {
        println!("Restore cancelled.");
        return Ok(());
    }

    // Snapshot whatever is live before clobbering it.
    if let Some(current) = store.read_once().await? {
        let snapshot = backups.write_pre_restore_snapshot(&current)?;
        let stats = DirectoryStats::of(&current);
        println!(
            "Saved pre-restore snapshot of the current data ({} colleges, {} students) to {}.",
            stats.colleges,
            stats.students,
            snapshot.display(),
        );
    }

    store.write_all(&backup.data).await?;
    println!("Restore complete: {} is now live.", entry.file_name);
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
