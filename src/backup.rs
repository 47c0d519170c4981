//! Timestamped JSON backups of the whole directory, retention pruning, and
//! the emergency snapshot files written before destructive operations.
//!
//! File names sort lexicographically by timestamp, so "newest 30" is a plain
//! descending sort on the names.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Directory, DirectoryStats};

pub const RETAINED_BACKUPS: usize = 30;

const BACKUP_PREFIX: &str = "backup-";
const BACKUP_SUFFIX: &str = ".json";

/// Shape of a `backup-<timestamp>.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub timestamp: DateTime<Utc>,
    pub data: Directory,
    pub stats: DirectoryStats,
}

/// Shape of the monitor's `EMERGENCY-<epoch-ms>.json` files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyFile {
    pub timestamp: DateTime<Utc>,
    pub alert: String,
    pub before: DirectoryStats,
    pub after: DirectoryStats,
    pub recovery_data: Directory,
}

/// Shape of the `emergency-before-restore-<epoch-ms>.json` safety snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreRestoreFile {
    pub timestamp: DateTime<Utc>,
    pub note: String,
    pub data: Directory,
}

#[derive(Debug, Clone)]
pub struct BackupEntry {
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    pub stats: DirectoryStats,
}

pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).context("failed to create backups directory")
    }

    /// Writes one timestamped backup and prunes old ones. An empty directory
    /// is skipped without writing a file; returns the path written, if any.
    pub fn create_backup(&self, directory: &Directory) -> Result<Option<PathBuf>> {
        if directory.is_empty() {
            tracing::warn!("no data in the remote collection, skipping backup");
            return Ok(None);
        }
        self.ensure_dir()?;

        let now = Utc::now();
        let file_name = format!(
            "{BACKUP_PREFIX}{}{BACKUP_SUFFIX}",
            now.format("%Y-%m-%dT%H-%M-%S")
        );
        let path = self.dir.join(&file_name);
        let backup = BackupFile {
            timestamp: now,
            data: directory.clone(),
            stats: DirectoryStats::of(directory),
        };
        fs::write(&path, serde_json::to_string_pretty(&backup)?)
            .with_context(|| format!("failed to write backup {file_name}"))?;
        tracing::info!(
            file = %file_name,
            colleges = backup.stats.colleges,
            students = backup.stats.students,
            companies = backup.stats.companies,
            "backup created"
        );

        self.prune()?;
        Ok(Some(path))
    }

    /// Keeps only the newest `RETAINED_BACKUPS` backup files. Emergency and
    /// pre-restore snapshots are never pruned.
    pub fn prune(&self) -> Result<()> {
        let mut names = self.backup_file_names()?;
        names.sort();
        names.reverse();
        for stale in names.iter().skip(RETAINED_BACKUPS) {
            fs::remove_file(self.dir.join(stale))
                .with_context(|| format!("failed to delete old backup {stale}"))?;
            tracing::info!(file = %stale, "deleted old backup");
        }
        Ok(())
    }

    /// All backups, newest first, with their stored stats for display.
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        let mut names = self.backup_file_names()?;
        names.sort();
        names.reverse();
        names
            .into_iter()
            .map(|file_name| {
                let backup = self.load_backup(&file_name)?;
                Ok(BackupEntry {
                    file_name,
                    timestamp: backup.timestamp,
                    stats: backup.stats,
                })
            })
            .collect()
    }

    pub fn load_backup(&self, file_name: &str) -> Result<BackupFile> {
        let raw = fs::read_to_string(self.dir.join(file_name))
            .with_context(|| format!("failed to read backup {file_name}"))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse backup {file_name}"))
    }

    /// Safety snapshot of the current remote state, written unprompted before
    /// a restore overwrites it; a bad restore is itself always recoverable.
    pub fn write_pre_restore_snapshot(&self, current: &Directory) -> Result<PathBuf> {
        self.ensure_dir()?;
        let now = Utc::now();
        let path = self
            .dir
            .join(format!("emergency-before-restore-{}.json", now.timestamp_millis()));
        let snapshot = PreRestoreFile {
            timestamp: now,
            note: "Emergency backup before restore".to_string(),
            data: current.clone(),
        };
        fs::write(&path, serde_json::to_string_pretty(&snapshot)?)
            .context("failed to write pre-restore snapshot")?;
        Ok(path)
    }

    /// Emergency capture written by the integrity monitor on detected data
    /// loss: before/after stats plus the full recovery payload.
    pub fn write_emergency(
        &self,
        alert: &str,
        before: DirectoryStats,
        after: DirectoryStats,
        recovery_data: &Directory,
    ) -> Result<PathBuf> {
        self.ensure_dir()?;
        let now = Utc::now();
        let path = self
            .dir
            .join(format!("EMERGENCY-{}.json", now.timestamp_millis()));
        let emergency = EmergencyFile {
            timestamp: now,
            alert: alert.to_string(),
            before,
            after,
            recovery_data: recovery_data.clone(),
        };
        fs::write(&path, serde_json::to_string_pretty(&emergency)?)
            .context("failed to write emergency file")?;
        Ok(path)
    }

    fn backup_file_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).context("failed to list backups directory"),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to list backups directory")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::College;
    use std::thread::sleep;
    use std::time::Duration;

    fn sample_directory() -> Directory {
        let mut directory = Directory::new();
        directory.insert(
            "college_edu".to_string(),
            College {
                name: "Test College".to_string(),
                domain: "college.edu".to_string(),
                students: vec![],
                companies: vec![],
                created_at: Utc::now(),
            },
        );
        directory
    }

    #[test]
    fn empty_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path());
        assert!(manager.create_backup(&Directory::new()).unwrap().is_none());
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn backup_round_trips_directory_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path());
        let directory = sample_directory();

        let path = manager.create_backup(&directory).unwrap().unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.starts_with("backup-"));
        assert!(!file_name.contains(':'));

        let restored = manager.load_backup(&file_name).unwrap();
        assert_eq!(restored.data, directory);
        assert_eq!(restored.stats, DirectoryStats::of(&directory));
    }

    #[test]
    fn retention_keeps_newest_thirty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path());
        // Backup names have second precision; synthesize 35 distinct ones
        // rather than sleeping through 35 wall-clock seconds.
        for i in 0..35 {
            let name = format!("backup-2025-01-01T00-00-{i:02}.json");
            let backup = BackupFile {
                timestamp: Utc::now(),
                data: sample_directory(),
                stats: DirectoryStats::of(&sample_directory()),
            };
            std::fs::create_dir_all(dir.path()).unwrap();
            std::fs::write(
                dir.path().join(&name),
                serde_json::to_string(&backup).unwrap(),
            )
            .unwrap();
        }

        manager.prune().unwrap();
        let remaining = manager.list_backups().unwrap();
        assert_eq!(remaining.len(), RETAINED_BACKUPS);
        // The 30 most recent by timestamp survive, newest first.
        assert_eq!(remaining[0].file_name, "backup-2025-01-01T00-00-34.json");
        assert_eq!(
            remaining.last().unwrap().file_name,
            "backup-2025-01-01T00-00-05.json"
        );
    }

    #[test]
    fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path());
        manager.create_backup(&sample_directory()).unwrap();
        sleep(Duration::from_millis(1100));
        manager.create_backup(&sample_directory()).unwrap();

        let entries = manager.list_backups().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].file_name > entries[1].file_name);
    }

    #[test]
    fn emergency_files_use_their_own_naming() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path());
        let directory = sample_directory();
        let stats = DirectoryStats::of(&directory);

        let emergency = manager
            .write_emergency("Data loss detected", stats, stats, &directory)
            .unwrap();
        assert!(emergency
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("EMERGENCY-"));

        let pre_restore = manager.write_pre_restore_snapshot(&directory).unwrap();
        assert!(pre_restore
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("emergency-before-restore-"));

        // Neither counts as a regular backup, and pruning leaves them alone.
        assert!(manager.list_backups().unwrap().is_empty());
        manager.prune().unwrap();
        assert!(emergency.exists());
        assert!(pre_restore.exists());
    }
}
