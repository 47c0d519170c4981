use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::models::DirectoryStats;
use crate::state::AppState;

pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let stats = DirectoryStats::of(&state.directory.snapshot().await);
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "degraded": state.directory.is_degraded(),
            "stats": stats,
        })),
    )
}
