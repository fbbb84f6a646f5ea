/// Feature catalog endpoints
use crate::{
    auth::DeveloperGate,
    context::AppContext,
    error::{PulseError, PulseResult},
    features::{CreateFeatureRequest, ListFeaturesQuery, UpdateFeatureRequest},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};

/// Build feature routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/features", get(list_features).post(create_feature))
        .route("/api/features/category/:category", get(features_by_category))
        .route(
            "/api/features/:id",
            get(get_feature).put(update_feature).delete(delete_feature),
        )
        .route("/api/features/:id/archive", patch(archive_feature))
}

async fn list_features(
    State(ctx): State<AppContext>,
    WithRejection(Query(query), _): WithRejection<Query<ListFeaturesQuery>, PulseError>,
) -> PulseResult<Json<Value>> {
    let (features, pagination) = ctx.feature_manager.list(&query).await?;

    Ok(Json(json!({
        "success": true,
        "features": features,
        "pagination": pagination,
    })))
}

async fn get_feature(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    let feature = ctx.feature_manager.get(&id).await?;

    Ok(Json(json!({
        "success": true,
        "feature": feature,
    })))
}

async fn features_by_category(
    State(ctx): State<AppContext>,
    Path(category): Path<String>,
) -> PulseResult<Json<Value>> {
    let features = ctx.feature_manager.list_by_category(&category).await?;

    Ok(Json(json!({
        "success": true,
        "features": features,
    })))
}

async fn create_feature(
    State(ctx): State<AppContext>,
    auth: DeveloperGate,
    WithRejection(Json(req), _): WithRejection<Json<CreateFeatureRequest>, PulseError>,
) -> PulseResult<(StatusCode, Json<Value>)> {
    let feature = ctx.feature_manager.create(req).await?;
    tracing::info!(feature_id = %feature.id, by = %auth.user.id, "feature created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Feature created successfully",
            "feature": feature,
        })),
    ))
}

async fn update_feature(
    State(ctx): State<AppContext>,
    _auth: DeveloperGate,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateFeatureRequest>, PulseError>,
) -> PulseResult<Json<Value>> {
    let feature = ctx.feature_manager.update(&id, req).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feature updated successfully",
        "feature": feature,
    })))
}

async fn delete_feature(
    State(ctx): State<AppContext>,
    auth: DeveloperGate,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    ctx.feature_manager.delete(&id).await?;
    tracing::info!(feature_id = %id, by = %auth.user.id, "feature deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Feature deleted successfully",
    })))
}

async fn archive_feature(
    State(ctx): State<AppContext>,
    _auth: DeveloperGate,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    let feature = ctx.feature_manager.archive(&id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feature archived successfully",
        "feature": feature,
    })))
}
