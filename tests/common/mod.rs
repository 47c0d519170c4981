use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use serde::Serialize;
use tempfile::TempDir;
use tower::util::ServiceExt;

use college_connect::config::AppConfig;
use college_connect::directory::DirectoryService;
use college_connect::models::Directory;
use college_connect::routes;
use college_connect::session::SessionStore;
use college_connect::state::AppState;
use college_connect::store::MemoryStore;

pub struct TestApp {
    pub directory: Arc<DirectoryService>,
    pub store: Arc<MemoryStore>,
    router: Router,
    // Holds the session file for the lifetime of the test.
    _workdir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_store(MemoryStore::new()).await
    }

    pub async fn with_store(store: MemoryStore) -> Result<Self> {
        let workdir = TempDir::new()?;
        let config = AppConfig {
            store_url: "https://store.test".to_string(),
            store_auth_token: None,
            store_poll_seconds: 2,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            backups_dir: workdir.path().join("backups"),
            session_file: workdir.path().join("session.json"),
            backup_interval_seconds: 86_400,
            spreadsheet_id: None,
            sheets_token: None,
            cors_allowed_origin: None,
        };

        let store = Arc::new(store);
        let directory = Arc::new(DirectoryService::new(store.clone()));
        directory.load().await;
        directory.spawn_watch();

        let sessions = SessionStore::new(config.session_file.clone());
        let state = AppState::new(directory.clone(), sessions, config);
        let router = routes::create_router(state);

        Ok(Self {
            directory,
            store,
            router,
            _workdir: workdir,
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self._workdir.path().join("session.json")
    }

    pub fn remote_data(&self) -> Option<Directory> {
        self.store.current()
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body.collect().await?;
    Ok(collected.to_bytes().to_vec())
}
