/// Throttling for unauthenticated credential endpoints
use crate::{
    context::AppContext,
    error::{PulseError, PulseResult},
};
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, time::Duration};

/// Paths whose POSTs count against the credential quota
pub const CREDENTIAL_PATHS: [&str; 4] = [
    "/api/signup",
    "/api/login",
    "/api/otp/verify",
    "/api/validateotp",
];

const FALLBACK_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(60) {
    Some(n) => n,
    None => unreachable!(),
};

/// Global quota shared by signup, login and code verification
pub struct CredentialRateLimiter {
    limiter: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl CredentialRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_PER_MINUTE));

        Self {
            limiter: GovernorLimiter::direct(quota),
        }
    }

    pub fn check(&self) -> PulseResult<()> {
        self.limiter.check().map_err(|_| PulseError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

pub fn is_credential_request(method: &Method, path: &str) -> bool {
    method == Method::POST && CREDENTIAL_PATHS.contains(&path)
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, PulseError> {
    if let Some(limiter) = &ctx.rate_limiter {
        if is_credential_request(request.method(), request.uri().path()) {
            if let Err(e) = limiter.check() {
                tracing::warn!(path = %request.uri().path(), "credential endpoint throttled");
                return Err(e);
            }
        }
    }

    Ok(next.run(request).await)
}
