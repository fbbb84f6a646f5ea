/// Bearer-token extractors gated by role
use crate::{
    account::{Role, User},
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::PulseError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

/// Which roles a gate admits
pub trait RolePolicy: Send + Sync + 'static {
    /// Message returned when a resolved user is refused
    const DENIED: &'static str;

    fn allows(role: Role) -> bool;
}

/// Any signed-in user
#[derive(Debug, Clone, Copy)]
pub struct AnyRole;

impl RolePolicy for AnyRole {
    const DENIED: &'static str = "Access denied";

    fn allows(_role: Role) -> bool {
        true
    }
}

/// Developers and admins
#[derive(Debug, Clone, Copy)]
pub struct DeveloperRole;

impl RolePolicy for DeveloperRole {
    const DENIED: &'static str = "Developer or admin role required";

    fn allows(role: Role) -> bool {
        role.is_developer()
    }
}

/// Resolved caller, admitted by policy `P`
#[derive(Debug, Clone)]
pub struct Gate<P: RolePolicy> {
    pub user: User,
    _policy: PhantomData<P>,
}

impl<P: RolePolicy> Gate<P> {
    pub fn into_user(self) -> User {
        self.user
    }
}

pub type AuthGate = Gate<AnyRole>;
pub type DeveloperGate = Gate<DeveloperRole>;

#[async_trait]
impl<P: RolePolicy> FromRequestParts<AppContext> for Gate<P> {
    type Rejection = PulseError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| PulseError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.account_manager.validate_access_token(&token)?;

        // Token may outlive its user
        let user = state
            .account_manager
            .find_user(&claims.sub)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.sub, "token references unknown user");
                PulseError::Authentication("User not found".to_string())
            })?;

        if !P::allows(user.role) {
            tracing::warn!(user_id = %user.id, role = user.role.as_str(), "role check failed");
            return Err(PulseError::Authorization(P::DENIED.to_string()));
        }

        Ok(Gate {
            user,
            _policy: PhantomData,
        })
    }
}
