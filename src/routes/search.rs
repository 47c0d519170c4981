use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::directory::{SearchMode, SearchResults};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub mode: Option<SearchMode>,
}

pub async fn search_directory(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResults> {
    let mode = params.mode.unwrap_or(SearchMode::College);
    Json(state.directory.search(&params.q, mode).await)
}
