//! End-to-end tests driving the assembled router
//!
//! Each test gets its own in-memory database and a mail transport that keeps
//! every message, so signup codes can be read back out of the "sent" email.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use client_pulse::{
    config::ServerConfig,
    context::AppContext,
    db,
    error::PulseResult,
    mailer::{MailTransport, Mailer, OutgoingEmail},
    server::build_router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;

const PASSWORD: &str = "Str0ng!Pass";

#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl MailTransport for CapturingTransport {
    async fn send(&self, _from: &str, email: &OutgoingEmail) -> PulseResult<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

impl CapturingTransport {
    /// Most recent code mailed to `to`; delivery runs on a spawned task
    async fn code_for(&self, to: &str) -> String {
        for _ in 0..100 {
            let found = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|e| e.to == to)
                .map(|e| e.text.clone());

            if let Some(text) = found {
                let start = text.find("code is: ").expect("code line") + "code is: ".len();
                return text[start..start + 4].to_string();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no email delivered to {}", to);
    }
}

struct TestApp {
    router: Router,
    mail: Arc<CapturingTransport>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(ServerConfig::for_testing()).await
    }

    async fn with_config(config: ServerConfig) -> Self {
        let pool = db::create_test_pool().await.unwrap();
        let mail = Arc::new(CapturingTransport::default());
        let mailer = Mailer::with_transport("donotreply@pulse.test", mail.clone());
        let ctx = AppContext::with_pool_and_mailer(config, pool, mailer);

        Self {
            router: build_router(ctx),
            mail,
        }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Signup, verify and login; returns (user id, token)
    async fn register(&self, name: &str, email: &str, role: &str) -> (String, String) {
        let (status, _) = self
            .request(
                Method::POST,
                "/api/signup",
                None,
                Some(json!({
                    "fullName": name,
                    "email": email,
                    "password": PASSWORD,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let code = self.mail.code_for(email).await;
        let (status, _) = self
            .request(
                Method::POST,
                "/api/otp/verify",
                None,
                Some(json!({ "email": email, "otp": code })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        self.login(email).await
    }

    async fn login(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn create_feature(&self, token: &str, name: &str, category: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/features",
                Some(token),
                Some(json!({
                    "name": name,
                    "description": format!("{} description", name),
                    "category": category,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "feature create failed: {}", body);
        body["feature"]["id"].as_str().unwrap().to_string()
    }

    async fn create_feedback(&self, token: &str, feature_id: &str, rating: i64) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/feedback",
            Some(token),
            Some(json!({
                "featureId": feature_id,
                "description": "It works mostly",
                "category": "ui",
                "priority": "high",
                "rating": rating,
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_signup_verify_login_flow() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({
                "fullname": "Ada Lovelace",
                "email": "Ada@Example.com",
                "password": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["otpSent"], true);
    assert_eq!(body["email"], "ada@example.com");
    assert!(body.get("otp").is_none());

    // Login is impossible before verification
    let (status, body) = app
        .request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let code = app.mail.code_for("ada@example.com").await;
    let number: u64 = code.parse().unwrap();

    // Numeric codes are accepted on the /api/validateotp alias too
    let (status, body) = app
        .request(
            Method::POST,
            "/api/validateotp",
            None,
            Some(json!({ "email": "ada@example.com", "otp": number })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["accountCreated"], true);
    assert!(body.get("token").is_none());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada Lovelace");
    assert_eq!(body["user"]["role"], "client");
    assert!(body["token"].as_str().is_some());

    // Pending record is gone once used
    let (status, _) = app
        .request(
            Method::POST,
            "/api/otp/verify",
            None,
            Some(json!({ "email": "ada@example.com", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signup_rejects_registered_email_and_bad_input() {
    let app = TestApp::new().await;
    app.register("Ada", "ada@example.com", "client").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({ "fullname": "Ada", "email": "ada@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already Registered");

    let (status, body) = app
        .request(Method::POST, "/api/signup", None, Some(json!({ "email": "x@example.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All fields must be filled");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({ "fullname": "X", "email": "x@example.com", "password": "weak" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password is not Strong");
}

#[tokio::test]
async fn test_wrong_code_then_lockout() {
    let app = TestApp::new().await;
    app.request(
        Method::POST,
        "/api/signup",
        None,
        Some(json!({ "fullname": "Eve", "email": "eve@example.com", "password": PASSWORD })),
    )
    .await;
    let code = app.mail.code_for("eve@example.com").await;
    let wrong = if code == "0000" { "1111" } else { "0000" };

    for _ in 0..5 {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/otp/verify",
                None,
                Some(json!({ "email": "eve@example.com", "otp": wrong })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidCode");
    }

    // Even the right code is refused once the budget is spent
    let (status, body) = app
        .request(
            Method::POST,
            "/api/otp/verify",
            None,
            Some(json!({ "email": "eve@example.com", "otp": code })),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "TooManyAttempts");
}

#[tokio::test]
async fn test_verify_requires_email_and_code() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::POST, "/api/otp/verify", None, Some(json!({ "email": "a@b.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn test_malformed_json_uses_failure_envelope() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn test_gates_distinguish_unauthenticated_from_forbidden() {
    let app = TestApp::new().await;
    let (_, client) = app.register("Client", "client@example.com", "client").await;

    let feature = json!({ "name": "Dark mode", "description": "Night theme", "category": "feature" });

    let (status, body) = app
        .request(Method::POST, "/api/features", None, Some(feature.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthenticated");

    let (status, body) = app
        .request(Method::POST, "/api/features", Some("garbage"), Some(feature.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthenticated");

    let (status, body) = app
        .request(Method::POST, "/api/features", Some(&client), Some(feature))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, _) = app.request(Method::GET, "/api/getallusers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(Method::GET, "/api/getallusers", Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"][0]["email"], "client@example.com");
}

#[tokio::test]
async fn test_delete_user_protects_admins() {
    let app = TestApp::new().await;
    let (admin_id, _) = app.register("Root", "root@example.com", "admin").await;
    let (client_id, client) = app.register("Client", "client@example.com", "client").await;
    let (other_id, _) = app.register("Other", "other@example.com", "client").await;

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/deleteuser/{}", admin_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/deleteuser/{}", other_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "other@example.com");

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/deleteuser/{}", other_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A token whose user is gone no longer passes the gate
    let (_, survivor) = app.register("Survivor", "survivor@example.com", "client").await;
    app.request(Method::DELETE, &format!("/api/deleteuser/{}", client_id), Some(&survivor), None)
        .await;
    let (status, _) = app.request(Method::GET, "/api/getallusers", Some(&client), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_feedback_updates_feature_stats() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let (client_id, client) = app.register("Client", "client@example.com", "client").await;
    let feature_id = app.create_feature(&dev, "Dark mode", "feature").await;

    let (status, body) = app.create_feedback(&client, &feature_id, 4).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["feedback"]["title"], "Feedback for Dark mode");
    assert_eq!(body["feedback"]["authorId"], client_id.as_str());
    let first_id = body["feedback"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .request(Method::GET, &format!("/api/features/{}", feature_id), None, None)
        .await;
    assert_eq!(body["feature"]["feedbackCount"], 1);
    assert_eq!(body["feature"]["avgRating"], 4.0);
    assert_eq!(body["feature"]["metrics"]["userRequests"], 1);
    assert_eq!(body["feature"]["feedbackRefs"][0]["feedbackId"], first_id.as_str());
    assert_eq!(body["feature"]["feedbackRefs"][0]["votes"], 0);

    let (status, _) = app.create_feedback(&client, &feature_id, 2).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app
        .request(Method::GET, &format!("/api/features/{}", feature_id), None, None)
        .await;
    assert_eq!(body["feature"]["feedbackCount"], 2);
    assert_eq!(body["feature"]["avgRating"], 3.0);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/feedback/{}", first_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .request(Method::GET, &format!("/api/features/{}", feature_id), None, None)
        .await;
    assert_eq!(body["feature"]["feedbackCount"], 1);
    assert_eq!(body["feature"]["avgRating"], 2.0);
    assert_eq!(body["feature"]["metrics"]["userRequests"], 1);
    assert_eq!(body["feature"]["feedbackRefs"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/feedback/{}", first_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feedback_validation_and_missing_feature() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let (_, client) = app.register("Client", "client@example.com", "client").await;
    let feature_id = app.create_feature(&dev, "Search", "feature").await;

    for rating in [0, 6] {
        let (status, body) = app.create_feedback(&client, &feature_id, rating).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "rating {} accepted", rating);
        assert_eq!(body["error"], "ValidationError");
    }
    for rating in [1, 5] {
        let (status, _) = app.create_feedback(&client, &feature_id, rating).await;
        assert_eq!(status, StatusCode::CREATED, "rating {} rejected", rating);
    }

    let (status, _) = app.create_feedback(&client, "no-such-feature", 3).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.request(Method::GET, "/api/feedback", None, None).await;
    assert_eq!(body["pagination"]["total"], 2);

    let (status, _) = app.create_feedback("", &feature_id, 3).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_feedback_keeps_ownership() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let (client_id, client) = app.register("Shy Person", "shy@example.com", "client").await;
    let (_, other) = app.register("Other", "other@example.com", "client").await;
    let feature_id = app.create_feature(&dev, "Export", "feature").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/feedback",
            Some(&client),
            Some(json!({
                "featureId": feature_id,
                "description": "Needs CSV",
                "category": "feature",
                "priority": "low",
                "rating": 3,
                "isAnonymous": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["feedback"]["authorName"], "Anonymous");
    assert_eq!(body["feedback"]["anonymous"], true);
    let feedback_id = body["feedback"]["id"].as_str().unwrap().to_string();

    // Someone else cannot edit it
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/feedback/{}", feedback_id),
            Some(&other),
            Some(json!({ "rating": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The true author still can
    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/feedback/{}", feedback_id),
            Some(&client),
            Some(json!({ "rating": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback"]["rating"], 5);

    let (_, body) = app
        .request(Method::GET, &format!("/api/feedback/user/{}", client_id), Some(&client), None)
        .await;
    assert_eq!(body["feedback"].as_array().unwrap().len(), 1);

    // The public listing hides who wrote it
    for token in [None, Some(other.as_str())] {
        let (status, body) = app.request(Method::GET, "/api/feedback", token, None).await;
        assert_eq!(status, StatusCode::OK);
        let entry = &body["feedback"][0];
        assert_eq!(entry["authorName"], "Anonymous");
        assert!(entry.get("authorId").is_none());
        assert!(entry.get("authorEmail").is_none());
    }

    // Its author and developers still see it
    for token in [&client, &dev] {
        let (_, body) = app.request(Method::GET, "/api/feedback", Some(token.as_str()), None).await;
        assert_eq!(body["feedback"][0]["authorId"], client_id.as_str());
        assert_eq!(body["feedback"][0]["authorEmail"], "shy@example.com");
    }

    let (_, body) = app
        .request(Method::GET, &format!("/api/feedback/{}", feedback_id), Some(&other), None)
        .await;
    assert!(body["feedback"].get("authorEmail").is_none());
}

#[tokio::test]
async fn test_status_update_requires_developer() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let (_, client) = app.register("Client", "client@example.com", "client").await;
    let feature_id = app.create_feature(&dev, "Alerts", "story").await;
    let (_, body) = app.create_feedback(&client, &feature_id, 3).await;
    let feedback_id = body["feedback"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/feedback/{}/status", feedback_id);
    let triage = json!({ "status": "in_progress", "developerNotes": "Looking into it" });

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&client), Some(triage.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.request(Method::PUT, &uri, Some(&dev), Some(triage)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback"]["status"], "in_progress");
    assert_eq!(body["feedback"]["developerNotes"], "Looking into it");
}

#[tokio::test]
async fn test_archive_hides_from_listing_but_not_direct_fetch() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let (_, client) = app.register("Client", "client@example.com", "client").await;
    let keep = app.create_feature(&dev, "Keep", "feature").await;
    let archive = app.create_feature(&dev, "Archive me", "feature").await;

    let (status, body) = app
        .request(Method::PATCH, &format!("/api/features/{}/archive", archive), Some(&dev), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature"]["archived"], true);

    let (_, body) = app.request(Method::GET, "/api/features", None, None).await;
    let ids: Vec<&str> = body["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![keep.as_str()]);
    assert_eq!(body["pagination"]["total"], 1);

    let (_, body) = app
        .request(Method::GET, "/api/features?includeArchived=true", None, None)
        .await;
    assert_eq!(body["pagination"]["total"], 2);

    let (status, body) = app
        .request(Method::GET, &format!("/api/features/{}", archive), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feature"]["archived"], true);

    // Feedback archive follows the same rule
    let (_, body) = app.create_feedback(&client, &keep, 4).await;
    let feedback_id = body["feedback"]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .request(Method::PATCH, &format!("/api/feedback/{}/archive", feedback_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.request(Method::GET, "/api/feedback", None, None).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (status, body) = app
        .request(Method::GET, &format!("/api/feedback/{}", feedback_id), Some(&client), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback"]["archived"], true);
}

#[tokio::test]
async fn test_feature_update_stamps_completion_once() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let feature_id = app.create_feature(&dev, "Ship it", "feature").await;
    let uri = format!("/api/features/{}", feature_id);

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&dev), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let stamped = body["feature"]["completedDate"].clone();
    assert!(stamped.is_string());

    let (_, body) = app
        .request(Method::PUT, &uri, Some(&dev), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(body["feature"]["completedDate"], stamped);

    let (status, _) = app
        .request(
            Method::PUT,
            &uri,
            Some(&dev),
            Some(json!({ "metrics": { "complexity": 11 } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feature_listing_filters_and_category_route() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    app.create_feature(&dev, "Crash on save", "bug").await;
    app.create_feature(&dev, "Typo in footer", "bug").await;
    app.create_feature(&dev, "Dark mode", "feature").await;

    let (_, body) = app
        .request(Method::GET, "/api/features?category=bug&limit=1&page=2", None, None)
        .await;
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["pages"], 2);
    assert_eq!(body["features"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .request(Method::GET, "/api/features/category/bug", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["features"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .request(Method::GET, "/api/features/category/nonsense", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(Method::GET, "/api/features?sortBy=password", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .request(Method::GET, "/api/features/does-not-exist", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feature_delete_is_physical() {
    let app = TestApp::new().await;
    let (_, dev) = app.register("Dev", "dev@example.com", "developer").await;
    let feature_id = app.create_feature(&dev, "Temporary", "documentation").await;
    let uri = format!("/api/features/{}", feature_id);

    let (status, _) = app.request(Method::DELETE, &uri, Some(&dev), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request(Method::DELETE, &uri, Some(&dev), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_configurations_and_health() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/configurations", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ratingOptions"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["featureStatuses"][1]["value"], "in_development");

    let (status, body) = app
        .request(Method::GET, "/api/configurations/priority-options", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][3]["value"], "urgent");

    for uri in ["/health", "/api/configurations/health"] {
        let (status, body) = app.request(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API is healthy");
    }
}

#[tokio::test]
async fn test_unknown_route_is_enveloped_404() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let app = TestApp::new().await;
    app.request(Method::GET, "/health", None, None).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pulse_http_requests_total"));
}

#[tokio::test]
async fn test_credential_endpoints_are_throttled() {
    let mut config = ServerConfig::for_testing();
    config.rate_limit.enabled = true;
    config.rate_limit.credential_requests_per_minute = 2;
    let app = TestApp::with_config(config).await;
    let login = json!({ "email": "nobody@example.com", "password": PASSWORD });

    for _ in 0..2 {
        let (status, _) = app
            .request(Method::POST, "/api/login", None, Some(login.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = app
        .request(Method::POST, "/api/login", None, Some(login))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "RateLimitExceeded");

    // Reads are not counted
    let (status, _) = app.request(Method::GET, "/api/features", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
