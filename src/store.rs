//! Remote store client: one logical collection, read-once, full-document
//! write, and change subscription. The store is the only serialization point
//! between processes, at the granularity of last full-document write wins.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{AppConfig, COLLECTION_PATH};
use crate::models::Directory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected credentials")]
    Unauthorized,
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned status {0}")]
    Status(StatusCode),
}

/// Latest observed value of the collection. `seq` increments on every
/// observed change; `data` is `None` while the collection is empty.
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    pub seq: u64,
    pub data: Option<Directory>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    async fn read_once(&self) -> Result<Option<Directory>, StoreError>;

    /// Unconditional whole-document overwrite; there is no field-level API.
    async fn write_all(&self, data: &Directory) -> Result<(), StoreError>;

    /// Watch the collection. Intermediate snapshots may be coalesced;
    /// subscribers always see the latest value after `changed()`.
    fn subscribe(&self) -> watch::Receiver<StoreSnapshot>;
}

/// REST client for an RTDB-style document store: `GET`/`PUT` on
/// `{base}/colleges.json`, optional `auth` query parameter. Change
/// notification is a background poll feeding a watch channel.
pub struct RtdbStore {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
    tx: watch::Sender<StoreSnapshot>,
}

impl RtdbStore {
    /// Probes the collection once so credential problems surface at startup
    /// rather than on the first write.
    pub async fn connect(config: &AppConfig) -> Result<Arc<Self>, StoreError> {
        let store = Arc::new(Self {
            client: Client::new(),
            endpoint: format!(
                "{}/{}.json",
                config.store_url.trim_end_matches('/'),
                COLLECTION_PATH
            ),
            auth_token: config.store_auth_token.clone(),
            tx: watch::channel(StoreSnapshot::default()).0,
        });
        store.read_once().await?;
        store.clone().spawn_poller(Duration::from_secs(config.store_poll_seconds.max(1)));
        Ok(store)
    }

    fn spawn_poller(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut last: Option<Option<Directory>> = None;
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.read_once().await {
                    Ok(data) => {
                        if last.as_ref() != Some(&data) {
                            last = Some(data.clone());
                            self.tx.send_modify(|snapshot| {
                                snapshot.seq += 1;
                                snapshot.data = data;
                            });
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "store poll failed");
                    }
                }
            }
        });
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    fn check_status(status: StatusCode) -> Result<(), StoreError> {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized),
            status if status.is_success() => Ok(()),
            status => Err(StoreError::Status(status)),
        }
    }
}

#[async_trait]
impl RemoteStore for RtdbStore {
    async fn read_once(&self) -> Result<Option<Directory>, StoreError> {
        let response = self.request(self.client.get(&self.endpoint)).send().await?;
        Self::check_status(response.status())?;
        // An empty collection comes back as literal `null`.
        let payload: Option<Directory> = response.json().await?;
        Ok(payload.filter(|directory| !directory.is_empty()))
    }

    async fn write_all(&self, data: &Directory) -> Result<(), StoreError> {
        let response = self
            .request(self.client.put(&self.endpoint))
            .json(data)
            .send()
            .await?;
        Self::check_status(response.status())
    }

    fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }
}

/// In-process store used by tests and local development. Writes publish a
/// snapshot immediately instead of waiting for a poll.
pub struct MemoryStore {
    data: Mutex<Option<Directory>>,
    tx: watch::Sender<StoreSnapshot>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            data: Mutex::new(None),
            tx: watch::channel(StoreSnapshot::default()).0,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(directory: Directory) -> Self {
        let store = Self::default();
        *store.data.lock().unwrap() = Some(directory.clone());
        store.publish(Some(directory));
        store
    }

    /// Simulates an out-of-band wipe of the collection.
    pub fn wipe(&self) {
        *self.data.lock().unwrap() = None;
        self.publish(None);
    }

    pub fn current(&self) -> Option<Directory> {
        self.data.lock().unwrap().clone()
    }

    fn publish(&self, data: Option<Directory>) {
        self.tx.send_modify(|snapshot| {
            snapshot.seq += 1;
            snapshot.data = data;
        });
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_once(&self) -> Result<Option<Directory>, StoreError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .clone()
            .filter(|directory| !directory.is_empty()))
    }

    async fn write_all(&self, data: &Directory) -> Result<(), StoreError> {
        *self.data.lock().unwrap() = Some(data.clone());
        self.publish(Some(data.clone()));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }
}
