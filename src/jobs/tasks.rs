/// Background task implementations
use crate::{context::AppContext, error::AppResult};

/// Cleanup expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> AppResult<u64> {
    let deleted = ctx.sessions.cleanup_expired().await?;

    // Drop rate limiter state for clients that have been quiet
    ctx.rate_limiter.retain_recent();

    Ok(deleted)
}

/// Cleanup used and expired password reset tokens
pub async fn cleanup_reset_tokens(ctx: &AppContext) -> AppResult<u64> {
    ctx.accounts.cleanup_reset_tokens().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
