use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

pub async fn current_session(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let student = state.sessions.load()?;
    Ok(Json(json!({ "student": student })))
}

pub async fn clear_session(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.sessions.clear()?;
    Ok(StatusCode::NO_CONTENT)
}
