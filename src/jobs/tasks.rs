/// Background task implementations
use crate::{context::AppContext, error::PulseResult};

/// Delete pending registrations whose lifetime has elapsed
pub async fn reap_expired_registrations(ctx: &AppContext) -> PulseResult<u64> {
    ctx.otp_manager.cleanup_expired().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> PulseResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    Ok(())
}
