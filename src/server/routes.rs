use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::server::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route_service("/", ServeFile::new(config.static_dir.join("index.html")))
        .route("/favicon.ico", get(handlers::favicon))
        .route("/health", get(handlers::health_check))
        .route("/api/upload", post(handlers::upload))
        .route("/api/generate", post(handlers::generate))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .nest_service("/generations", ServeDir::new(&config.generations_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
