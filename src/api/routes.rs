use axum::{extract::DefaultBodyLimit, Router, routing::{get, post}};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;
use axum::http::Method;
use crate::AppState;
use crate::api::{handlers, handlers_predict};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any()) // Browser extension and local pages post screenshots from arbitrary origins
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/metrics", get(handlers::metrics))
        .route("/predict", post(handlers_predict::predict))
        .route("/screenshots/:filename", get(handlers::serve_screenshot))
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
