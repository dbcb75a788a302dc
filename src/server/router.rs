//! Router builder utilities

use crate::server::handlers::{
    AppState, create_document, delete_document, get_document, list_documents, overview,
    topic_by_slug, update_document,
};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

/// Build the API routes
///
/// - GET /overview - Topic overview (search, tag post-filter, most popular)
/// - GET /topics/{slug} - One topic by slug, with tags, reports and votes
/// - GET /api/v1/{collection} - List documents
/// - POST /api/v1/{collection} - Create a document
/// - GET /api/v1/{collection}/{id} - Get a document
/// - PATCH /api/v1/{collection}/{id} - Update a document
/// - DELETE /api/v1/{collection}/{id} - Delete a document
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/overview", get(overview))
        .route("/topics/{slug}", get(topic_by_slug))
        .route(
            "/api/v1/{collection}",
            get(list_documents).post(create_document),
        )
        .route(
            "/api/v1/{collection}/{id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .with_state(state)
}

/// Build health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "observers-rs"
    }))
}
