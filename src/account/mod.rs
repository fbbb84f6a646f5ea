/// Account management system
///
/// Handles user records, password hashing, login and token issuance. Users are
/// never created directly; they are promoted from a verified pending
/// registration (see `crate::otp`).

mod manager;

pub use manager::{hash_password, normalize_email, verify_password, AccountManager, TokenClaims};
pub(crate) use manager::insert_user;

use crate::error::{PulseError, PulseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Privilege tiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Developer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Developer => "developer",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "developer" => Ok(Role::Developer),
            "admin" => Ok(Role::Admin),
            _ => Err(PulseError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Developers and admins may mutate features and triage feedback
    pub fn is_developer(&self) -> bool {
        matches!(self, Role::Developer | Role::Admin)
    }
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub fullname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    #[serde(default, alias = "fullName")]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Identity summary returned on login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: UserSummary,
    pub token: String,
}

/// Entry in the user directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListing {
    pub user_id: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserListing {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            fullname: user.fullname,
            email: user.email,
            role: user.role,
        }
    }
}
