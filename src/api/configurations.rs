/// Read-only option lists for client dropdowns
use crate::{context::AppContext, options};
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

/// Build configuration routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/configurations", get(all_configurations))
        .route("/api/configurations/feedback-categories", get(feedback_categories))
        .route("/api/configurations/priority-options", get(priority_options))
        .route("/api/configurations/rating-options", get(rating_options))
        .route("/api/configurations/feature-categories", get(feature_categories))
        .route("/api/configurations/feature-statuses", get(feature_statuses))
        .route("/api/configurations/health", get(health))
}

async fn all_configurations() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": options::all_configurations(),
    }))
}

async fn feedback_categories() -> Json<Value> {
    Json(json!({ "success": true, "data": options::feedback_categories() }))
}

async fn priority_options() -> Json<Value> {
    Json(json!({ "success": true, "data": options::priority_options() }))
}

async fn rating_options() -> Json<Value> {
    Json(json!({ "success": true, "data": options::rating_options() }))
}

async fn feature_categories() -> Json<Value> {
    Json(json!({ "success": true, "data": options::feature_categories() }))
}

async fn feature_statuses() -> Json<Value> {
    Json(json!({ "success": true, "data": options::feature_statuses() }))
}

/// Liveness body shared with the root `/health` route
pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "API is healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
