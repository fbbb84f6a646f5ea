/// Feedback endpoints
use crate::{
    auth::{AuthGate, DeveloperGate},
    context::AppContext,
    error::{PulseError, PulseResult},
    feedback::{
        CreateFeedbackRequest, Feedback, ListFeedbackQuery, UpdateFeedbackRequest,
        UpdateFeedbackStatusRequest,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};

/// Build feedback routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/feedback", get(list_feedback).post(create_feedback))
        .route("/api/feedback/user/:user_id", get(feedback_by_user))
        .route(
            "/api/feedback/:id",
            get(get_feedback).put(update_feedback).delete(delete_feedback),
        )
        .route("/api/feedback/:id/status", put(update_feedback_status))
        .route("/api/feedback/:id/archive", patch(archive_feedback))
}

/// Public listing; a valid token only widens what anonymous entries reveal
async fn list_feedback(
    State(ctx): State<AppContext>,
    viewer: Option<AuthGate>,
    WithRejection(Query(query), _): WithRejection<Query<ListFeedbackQuery>, PulseError>,
) -> PulseResult<Json<Value>> {
    let (feedback, pagination) = ctx.feedback_manager.list(&query).await?;
    let viewer = viewer.map(AuthGate::into_user);
    let feedback: Vec<Feedback> = feedback
        .into_iter()
        .map(|f| f.redact_for(viewer.as_ref()))
        .collect();

    Ok(Json(json!({
        "success": true,
        "feedback": feedback,
        "pagination": pagination,
    })))
}

async fn create_feedback(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    WithRejection(Json(req), _): WithRejection<Json<CreateFeedbackRequest>, PulseError>,
) -> PulseResult<(StatusCode, Json<Value>)> {
    let feedback = ctx.feedback_manager.create(&auth.user, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Feedback submitted successfully",
            "feedback": feedback,
        })),
    ))
}

async fn feedback_by_user(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    Path(user_id): Path<String>,
) -> PulseResult<Json<Value>> {
    let feedback: Vec<Feedback> = ctx
        .feedback_manager
        .list_by_user(&user_id)
        .await?
        .into_iter()
        .map(|f| f.redact_for(Some(&auth.user)))
        .collect();

    Ok(Json(json!({
        "success": true,
        "feedback": feedback,
    })))
}

async fn get_feedback(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    let feedback = ctx.feedback_manager.get(&id).await?.redact_for(Some(&auth.user));

    Ok(Json(json!({
        "success": true,
        "feedback": feedback,
    })))
}

async fn update_feedback(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateFeedbackRequest>, PulseError>,
) -> PulseResult<Json<Value>> {
    let feedback = ctx.feedback_manager.update(&id, &auth.user, req).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feedback updated successfully",
        "feedback": feedback,
    })))
}

/// Triage fields are reserved for developers
async fn update_feedback_status(
    State(ctx): State<AppContext>,
    auth: DeveloperGate,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateFeedbackStatusRequest>, PulseError>,
) -> PulseResult<Json<Value>> {
    let feedback = ctx.feedback_manager.update_status(&id, req).await?;
    tracing::info!(
        feedback_id = %id,
        status = feedback.status.as_str(),
        by = %auth.user.id,
        "feedback triaged"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Feedback status updated successfully",
        "feedback": feedback,
    })))
}

async fn delete_feedback(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    ctx.feedback_manager.delete(&id, &auth.user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feedback deleted successfully",
    })))
}

async fn archive_feedback(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    let feedback = ctx.feedback_manager.archive(&id, &auth.user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Feedback archived successfully",
        "feedback": feedback,
    })))
}
