/// Account manager implementation using runtime queries
use crate::{
    account::{Role, User},
    config::ServerConfig,
    error::{PulseError, PulseResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hash a password with Argon2id on the blocking pool
pub async fn hash_password(password: &str) -> PulseResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PulseError::Internal(format!("Password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| PulseError::Internal(format!("Password hashing worker failed: {}", e)))?
}

/// Check a password against a stored Argon2 hash
pub async fn verify_password(password: &str, hash: &str) -> PulseResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| PulseError::Internal(format!("Password verification worker failed: {}", e)))
}

/// Insert a user row on an existing connection, so promotion can share a transaction
pub(crate) async fn insert_user(
    conn: &mut SqliteConnection,
    fullname: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> PulseResult<User> {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        fullname: fullname.to_string(),
        email: normalize_email(email),
        password_hash: password_hash.to_string(),
        role,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO users (id, fullname, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&user.id)
    .bind(&user.fullname)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            PulseError::Conflict("Email already registered".to_string())
        }
        other => PulseError::Database(other),
    })?;

    Ok(user)
}

fn user_from_row(row: &SqliteRow) -> PulseResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        fullname: row.try_get("fullname")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_str(&role)?,
        created_at: row.try_get("created_at")?,
    })
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Authenticate by email and password, returning the user and a fresh token
    pub async fn login(&self, email: &str, password: &str) -> PulseResult<(User, String)> {
        let email = normalize_email(email);

        // Uniform failure so callers cannot tell which emails exist
        let user = self
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| PulseError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "login rejected: password mismatch");
            return Err(PulseError::Authentication("Invalid email or password".to_string()));
        }

        let token = self.generate_access_token(&user)?;
        tracing::info!(user_id = %user.id, "login succeeded");

        Ok((user, token))
    }

    /// Issue a signed access token for a user
    pub fn generate_access_token(&self, user: &User) -> PulseResult<String> {
        let now = Utc::now();
        self.encode_claims(&TokenClaims {
            sub: user.id.clone(),
            role: user.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.config.authentication.token_ttl_hours)).timestamp(),
        })
    }

    pub(crate) fn encode_claims(&self, claims: &TokenClaims) -> PulseResult<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| PulseError::Jwt(format!("Failed to generate token: {}", e)))
    }

    /// Verify signature and expiry of an access token
    pub fn validate_access_token(&self, token: &str) -> PulseResult<TokenClaims> {
        let decoding_key =
            DecodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT verification failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        PulseError::Authentication("Token expired".to_string())
                    }
                    _ => PulseError::Authentication("Invalid token".to_string()),
                }
            })
    }

    /// Get user by id
    pub async fn get_user(&self, id: &str) -> PulseResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| PulseError::NotFound("User not found".to_string()))
    }

    /// Look up a user by id without failing when absent
    pub async fn find_user(&self, id: &str) -> PulseResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, fullname, email, password_hash, role, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Look up a user by email
    pub async fn find_user_by_email(&self, email: &str) -> PulseResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, fullname, email, password_hash, role, created_at FROM users WHERE email = ?1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Check if email is registered
    pub async fn email_exists(&self, email: &str) -> PulseResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(normalize_email(email))
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// List all users, oldest first
    pub async fn list_users(&self) -> PulseResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, fullname, email, password_hash, role, created_at
             FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Delete a user; admin accounts are protected
    pub async fn delete_user(&self, id: &str) -> PulseResult<User> {
        let user = self.get_user(id).await?;

        if user.role == Role::Admin {
            tracing::warn!(user_id = %id, "refused to delete admin account");
            return Err(PulseError::Authorization(
                "Admin accounts cannot be deleted".to_string(),
            ));
        }

        // Role guard repeated in SQL so a concurrent promotion cannot slip through
        let result = sqlx::query("DELETE FROM users WHERE id = ?1 AND role != 'admin'")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PulseError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id = %id, "user deleted");
        Ok(user)
    }
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
