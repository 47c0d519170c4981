use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod colleges;
pub mod health;
pub mod search;
pub mod session;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let colleges_routes = Router::new()
        .route("/", get(colleges::list_colleges).post(colleges::create_college))
        .route("/:key", get(colleges::get_college))
        .route("/:key/companies", post(colleges::add_company))
        .route("/:key/selections", post(colleges::toggle_selection));

    Router::new()
        .route("/api/register", post(colleges::register))
        .nest("/api/colleges", colleges_routes)
        .route("/api/search", get(search::search_directory))
        .route(
            "/api/session",
            get(session::current_session).delete(session::clear_session),
        )
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
