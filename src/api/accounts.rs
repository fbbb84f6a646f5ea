/// Signup, verification, login and user directory endpoints
use crate::{
    account::{LoginRequest, LoginResponse, SignupRequest, UserListing, UserSummary},
    auth::AuthGate,
    context::AppContext,
    error::{PulseError, PulseResult},
    otp::{SignupResponse, VerifyOtpRequest, VerifyOtpResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/otp/verify", post(verify_otp))
        .route("/api/validateotp", post(verify_otp))
        .route("/api/login", post(login))
        .route("/api/getallusers", get(list_users))
        .route("/api/deleteuser/:id", delete(delete_user))
}

/// Stage a registration and email its code
async fn signup(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, PulseError>,
) -> PulseResult<Json<SignupResponse>> {
    let pending = ctx.otp_manager.request_signup(req).await?;

    Ok(Json(SignupResponse {
        success: true,
        message: "OTP sent to your email. Please verify to complete registration.".to_string(),
        otp_sent: true,
        email: pending.email,
    }))
}

async fn verify_otp(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): WithRejection<Json<VerifyOtpRequest>, PulseError>,
) -> PulseResult<(StatusCode, Json<VerifyOtpResponse>)> {
    let (email, code) = match (req.email, req.otp) {
        (Some(email), Some(otp)) if !email.trim().is_empty() => (email, otp.normalized()),
        _ => {
            return Err(PulseError::Validation(
                "Email and OTP are required".to_string(),
            ))
        }
    };

    let user = ctx.otp_manager.verify(&email, &code).await?;

    Ok((
        StatusCode::CREATED,
        Json(VerifyOtpResponse {
            success: true,
            message: "Account created successfully. Please log in.".to_string(),
            account_created: true,
            email: user.email,
        }),
    ))
}

async fn login(
    State(ctx): State<AppContext>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, PulseError>,
) -> PulseResult<Json<LoginResponse>> {
    let (email, password) = match (req.email, req.password) {
        (Some(e), Some(p)) if !e.trim().is_empty() && !p.is_empty() => (e, p),
        _ => {
            return Err(PulseError::Validation(
                "Email and password are required".to_string(),
            ))
        }
    };

    let (user, token) = ctx.account_manager.login(&email, &password).await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user: UserSummary::from(&user),
        token,
    }))
}

async fn list_users(State(ctx): State<AppContext>, _auth: AuthGate) -> PulseResult<Json<Value>> {
    let users: Vec<UserListing> = ctx
        .account_manager
        .list_users()
        .await?
        .into_iter()
        .map(UserListing::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "users": users,
    })))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    auth: AuthGate,
    Path(id): Path<String>,
) -> PulseResult<Json<Value>> {
    let user = ctx.account_manager.delete_user(&id).await?;
    tracing::info!(deleted = %user.id, by = %auth.user.id, "user removed");

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
        "user": UserListing::from(user),
    })))
}
