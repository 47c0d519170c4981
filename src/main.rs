use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use college_connect::config::AppConfig;
use college_connect::directory::DirectoryService;
use college_connect::routes::create_router;
use college_connect::session::SessionStore;
use college_connect::state::AppState;
use college_connect::store::RtdbStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    college_connect::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        store_url = %config.redacted_store_url(),
        poll_seconds = config.store_poll_seconds,
        server_host = %config.server_host,
        server_port = config.server_port,
        sheets_enabled = config.spreadsheet_id.is_some(),
        "loaded configuration"
    );

    let store = RtdbStore::connect(&config).await?;
    let directory = Arc::new(DirectoryService::new(store));
    directory.load().await;
    directory.spawn_watch();
    if directory.is_degraded() {
        tracing::warn!("starting in degraded mode, remote writes are off");
    }

    let sessions = SessionStore::new(config.session_file.clone());
    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;
    let router = create_router(AppState::new(directory, sessions, config));

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
