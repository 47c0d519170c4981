//! Integrity monitor: diffs successive observed snapshots of the remote
//! collection, flags anomalous shrinkage, and auto-restores once per
//! empty-payload incident.
//!
//! Passive by design: it never blocks writers, and its only corrective
//! action is writing the last known-good snapshot back when the collection
//! goes empty.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backup::BackupManager;
use crate::models::{Directory, DirectoryStats};
use crate::store::{RemoteStore, StoreError};

/// Count drops beyond these are classified as data loss rather than ordinary
/// shrinkage.
pub const STUDENT_LOSS_THRESHOLD: i64 = 5;
pub const COLLEGE_LOSS_THRESHOLD: i64 = 1;

#[derive(Debug)]
pub enum MonitorVerdict {
    /// Empty collection with no prior snapshot to restore from.
    EmptyIdle,
    /// Empty collection; last snapshot written back.
    EmptyRestored { restored: DirectoryStats },
    /// Empty collection, but this incident already got its one restore.
    EmptySkipped,
    /// Gross shrinkage; emergency file written, no automatic remediation.
    DataLoss {
        before: DirectoryStats,
        after: DirectoryStats,
        emergency_file: PathBuf,
    },
    Decreased {
        before: DirectoryStats,
        after: DirectoryStats,
    },
    Increased {
        before: DirectoryStats,
        after: DirectoryStats,
    },
    Healthy { stats: DirectoryStats },
}

pub struct IntegrityMonitor {
    store: Arc<dyn RemoteStore>,
    backups: BackupManager,
    last_snapshot: Option<Directory>,
    /// One-shot guard per detected incident: set when an empty payload is
    /// auto-restored, cleared again by any non-empty payload, so distinct
    /// incidents within one run each get exactly one restore.
    restored_this_incident: bool,
}

impl IntegrityMonitor {
    pub fn new(store: Arc<dyn RemoteStore>, backups: BackupManager) -> Self {
        Self {
            store,
            backups,
            last_snapshot: None,
            restored_this_incident: false,
        }
    }

    /// Evaluates one change notification. The tracked snapshot is replaced
    /// after evaluation on every non-empty payload; an empty payload keeps
    /// it, since it is the recovery source.
    pub async fn observe(
        &mut self,
        payload: Option<Directory>,
    ) -> Result<MonitorVerdict, MonitorError> {
        let Some(data) = payload.filter(|d| !d.is_empty()) else {
            return self.observe_empty().await;
        };

        let stats = DirectoryStats::of(&data);
        self.restored_this_incident = false;

        let verdict = match &self.last_snapshot {
            None => MonitorVerdict::Healthy { stats },
            Some(previous) => {
                let before = DirectoryStats::of(previous);
                let student_loss = before.students as i64 - stats.students as i64;
                let college_loss = before.colleges as i64 - stats.colleges as i64;

                if student_loss > STUDENT_LOSS_THRESHOLD || college_loss > COLLEGE_LOSS_THRESHOLD {
                    tracing::error!(
                        lost_students = student_loss,
                        lost_colleges = college_loss,
                        "data loss detected"
                    );
                    let emergency_file = self.backups.write_emergency(
                        "Data loss detected",
                        before,
                        stats,
                        previous,
                    )?;
                    tracing::error!(file = %emergency_file.display(), "emergency backup created");
                    MonitorVerdict::DataLoss {
                        before,
                        after: stats,
                        emergency_file,
                    }
                } else if student_loss > 0 || college_loss > 0 {
                    tracing::warn!(
                        lost_students = student_loss.max(0),
                        lost_colleges = college_loss.max(0),
                        "data decreased"
                    );
                    MonitorVerdict::Decreased {
                        before,
                        after: stats,
                    }
                } else if stats.students > before.students || stats.colleges > before.colleges {
                    MonitorVerdict::Increased {
                        before,
                        after: stats,
                    }
                } else {
                    MonitorVerdict::Healthy { stats }
                }
            }
        };

        tracing::info!(
            colleges = stats.colleges,
            students = stats.students,
            companies = stats.companies,
            "collection observed"
        );
        self.last_snapshot = Some(data);
        Ok(verdict)
    }

    async fn observe_empty(&mut self) -> Result<MonitorVerdict, MonitorError> {
        tracing::warn!("remote collection is empty");
        let Some(snapshot) = &self.last_snapshot else {
            return Ok(MonitorVerdict::EmptyIdle);
        };
        if self.restored_this_incident {
            return Ok(MonitorVerdict::EmptySkipped);
        }
        self.store.write_all(snapshot).await?;
        self.restored_this_incident = true;
        let restored = DirectoryStats::of(snapshot);
        tracing::info!(
            colleges = restored.colleges,
            students = restored.students,
            "collection restored from last snapshot"
        );
        Ok(MonitorVerdict::EmptyRestored { restored })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backup(#[from] anyhow::Error),
}
