/// Pending-registration store and verification workflow
use crate::{
    account::{hash_password, insert_user, normalize_email, Role, SignupRequest, User},
    config::ServerConfig,
    error::{PulseError, PulseResult},
    mailer::Mailer,
    metrics,
    otp::{PendingRegistration, CODE_LENGTH},
};
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, Rng};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use validator::ValidateEmail;

/// Minimum password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Require length plus lowercase, uppercase, digit and symbol
pub fn validate_password_strength(password: &str) -> PulseResult<()> {
    let strong = password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if strong {
        Ok(())
    } else {
        Err(PulseError::Validation("Password is not Strong".to_string()))
    }
}

fn pending_from_row(row: &SqliteRow) -> PulseResult<PendingRegistration> {
    let role: String = row.try_get("role")?;
    let attempts: i64 = row.try_get("attempts")?;
    Ok(PendingRegistration {
        email: row.try_get("email")?,
        code: row.try_get("code")?,
        fullname: row.try_get("fullname")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_str(&role)?,
        attempts: attempts.max(0) as u32,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

/// Signup staging and verification
pub struct OtpManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    mailer: Mailer,
}

impl OtpManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, mailer: Mailer) -> Self {
        Self { db, config, mailer }
    }

    /// Random fixed-width numeric code
    pub fn generate_code() -> String {
        let upper = 10u32.pow(CODE_LENGTH as u32);
        let value: u32 = OsRng.gen_range(0..upper);
        format!("{:0width$}", value, width = CODE_LENGTH)
    }

    /// Stage a signup and mail its verification code.
    ///
    /// Retrying before verification overwrites the code, the staged data and
    /// the expiry, and clears the attempt counter. The code itself is never
    /// returned.
    pub async fn request_signup(&self, request: SignupRequest) -> PulseResult<PendingRegistration> {
        let (fullname, email, password) = match (request.fullname, request.email, request.password) {
            (Some(f), Some(e), Some(p))
                if !f.trim().is_empty() && !e.trim().is_empty() && !p.is_empty() =>
            {
                (f.trim().to_string(), normalize_email(&e), p)
            }
            _ => {
                return Err(PulseError::Validation(
                    "All fields must be filled".to_string(),
                ))
            }
        };

        if !email.validate_email() {
            return Err(PulseError::Validation("Email is Invalid".to_string()));
        }
        validate_password_strength(&password)?;

        let registered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(&email)
            .fetch_one(&self.db)
            .await?;
        if registered > 0 {
            return Err(PulseError::Conflict("Email already Registered".to_string()));
        }

        let password_hash = hash_password(&password).await?;
        let code = Self::generate_code();
        let now = Utc::now();
        let pending = PendingRegistration {
            email,
            code,
            fullname,
            password_hash,
            role: request.role.unwrap_or_default(),
            attempts: 0,
            created_at: now,
            expires_at: now + Duration::seconds(self.config.registration.otp_ttl_seconds),
        };

        sqlx::query(
            "INSERT INTO pending_registration
                (email, code, fullname, password_hash, role, attempts, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)
             ON CONFLICT(email) DO UPDATE SET
                code = excluded.code,
                fullname = excluded.fullname,
                password_hash = excluded.password_hash,
                role = excluded.role,
                attempts = 0,
                expires_at = excluded.expires_at",
        )
        .bind(&pending.email)
        .bind(&pending.code)
        .bind(&pending.fullname)
        .bind(&pending.password_hash)
        .bind(pending.role.as_str())
        .bind(pending.created_at)
        .bind(pending.expires_at)
        .execute(&self.db)
        .await?;

        let valid_minutes = (self.config.registration.otp_ttl_seconds + 59) / 60;
        self.mailer
            .dispatch_otp(&pending.email, &pending.code, valid_minutes);

        metrics::record_signup_requested();
        tracing::info!(email = %pending.email, role = pending.role.as_str(), "signup staged, verification code sent");

        Ok(pending)
    }

    /// Look up an unexpired pending registration
    pub async fn get_pending(&self, email: &str) -> PulseResult<Option<PendingRegistration>> {
        let row = sqlx::query(
            "SELECT email, code, fullname, password_hash, role, attempts, created_at, expires_at
             FROM pending_registration WHERE email = ?1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        match row.as_ref().map(pending_from_row).transpose()? {
            Some(pending) if !pending.is_expired(Utc::now()) => Ok(Some(pending)),
            _ => Ok(None),
        }
    }

    /// Promote a pending registration to a user when the code matches.
    ///
    /// Expired records behave as absent. A wrong code counts against the
    /// record's attempt budget but never removes it.
    pub async fn verify(&self, email: &str, code: &str) -> PulseResult<User> {
        let email = normalize_email(email);
        let mut tx = self.db.begin().await?;

        // Count the attempt first so the transaction holds the write lock before
        // anything is read; rolled back unless the code turns out wrong
        let row = sqlx::query(
            "UPDATE pending_registration SET attempts = attempts + 1 WHERE email = ?1
             RETURNING email, code, fullname, password_hash, role, attempts - 1 AS attempts,
                       created_at, expires_at",
        )
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;

        let pending = match row.as_ref().map(pending_from_row).transpose()? {
            Some(pending) if !pending.is_expired(Utc::now()) => pending,
            _ => {
                metrics::record_otp_failure("not_found");
                return Err(PulseError::NotFound(
                    "OTP not found. Please request a new one.".to_string(),
                ));
            }
        };

        if pending.attempts >= self.config.registration.otp_max_attempts {
            metrics::record_otp_failure("locked");
            tracing::warn!(email = %email, "verification locked after repeated failures");
            return Err(PulseError::TooManyAttempts(
                "Too many failed attempts. Please request a new code.".to_string(),
            ));
        }

        if pending.code != code.trim() {
            tx.commit().await?;

            metrics::record_otp_failure("invalid_code");
            tracing::warn!(email = %email, attempts = pending.attempts + 1, "verification code mismatch");
            return Err(PulseError::InvalidCode(
                "Invalid OTP. Please try again.".to_string(),
            ));
        }

        let user = insert_user(
            &mut *tx,
            &pending.fullname,
            &pending.email,
            &pending.password_hash,
            pending.role,
        )
        .await?;

        sqlx::query("DELETE FROM pending_registration WHERE email = ?1")
            .bind(&email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::record_account_verified();
        tracing::info!(user_id = %user.id, email = %user.email, "account verified and created");

        Ok(user)
    }

    /// Purge pending registrations whose lifetime has elapsed
    pub async fn cleanup_expired(&self) -> PulseResult<u64> {
        let result = sqlx::query("DELETE FROM pending_registration WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
