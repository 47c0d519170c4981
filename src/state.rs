use std::sync::Arc;

use crate::{config::AppConfig, directory::DirectoryService, session::SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<DirectoryService>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(directory: Arc<DirectoryService>, sessions: SessionStore, config: AppConfig) -> Self {
        Self {
            directory,
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}
