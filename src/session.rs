//! Local persistent slot for the currently authenticated student. One JSON
//! file per deployment, read at startup, rewritten on every student change,
//! removed on logout.

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::Student;

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<Student>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("failed to read session file"),
        };
        let student = serde_json::from_str(&raw).context("failed to parse session file")?;
        Ok(Some(student))
    }

    pub fn save(&self, student: &Student) -> Result<()> {
        let raw = serde_json::to_string_pretty(student)?;
        fs::write(&self.path, raw).context("failed to write session file")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student() -> Student {
        Student {
            id: 42,
            name: "Alice".into(),
            email: "alice@college.edu".into(),
            linkedin: "linkedin.com/in/alice".into(),
            college_domain: "college.edu".into(),
            selections: vec![],
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn save_load_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&student()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.id, 42);
        assert_eq!(loaded.email, "alice@college.edu");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }
}
