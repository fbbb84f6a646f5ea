/// OTP-gated registration
///
/// A signup stages the user in `pending_registration` under a short numeric
/// code that is mailed to the address. Verification promotes the staged row to
/// a real user and removes it in the same transaction.

mod manager;

pub use manager::{validate_password_strength, OtpManager};

use crate::account::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of digits in a verification code
pub const CODE_LENGTH: usize = 4;

/// Staged signup awaiting verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub email: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub fullname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Code as submitted by clients, which send it either as a string or a number
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OtpInput {
    Text(String),
    Number(u64),
}

impl OtpInput {
    /// Canonical fixed-width form used for comparison
    pub fn normalized(&self) -> String {
        match self {
            OtpInput::Text(s) => s.trim().to_string(),
            OtpInput::Number(n) => format!("{:0width$}", n, width = CODE_LENGTH),
        }
    }
}

/// Verification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<OtpInput>,
}

/// Acknowledgment returned after a signup request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub otp_sent: bool,
    pub email: String,
}

/// Acknowledgment returned after a successful verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    pub account_created: bool,
    pub email: String,
}
