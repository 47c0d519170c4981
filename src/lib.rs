pub mod backup;
pub mod config;
pub mod directory;
pub mod error;
pub mod keys;
pub mod models;
pub mod monitor;
pub mod routes;
pub mod session;
pub mod sheets;
pub mod state;
pub mod store;

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
