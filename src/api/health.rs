/// Health check and metrics endpoints
///
/// - Liveness: the process answers
/// - Readiness: the database answers
/// - Detailed: per-component status for monitoring

use crate::{context::AppContext, error::AppResult, metrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub checks: Vec<ComponentHealth>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    /// "healthy", "degraded", or "unhealthy"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health/detailed", get(health_detailed))
        .route("/metrics", get(metrics_handler))
}

pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Returns 503 when the database does not answer
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = check_database(&ctx).await {
        tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

pub async fn health_detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![check_database_detailed(&ctx).await, check_mail(&ctx)];
    let status = determine_overall_status(&checks);

    let status_code = match status.as_str() {
        "unhealthy" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        status_code,
        Json(HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
}

/// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

async fn check_database(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match check_database(ctx).await {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            ComponentHealth {
                name: "database".to_string(),
                status: "unhealthy".to_string(),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
                error: Some("Database unavailable".to_string()),
            }
        }
    }
}

/// Missing mail configuration degrades password recovery but nothing else
fn check_mail(ctx: &AppContext) -> ComponentHealth {
    let configured = ctx.config.email.is_some();
    ComponentHealth {
        name: "email".to_string(),
        status: if configured { "healthy" } else { "degraded" }.to_string(),
        response_time_ms: None,
        error: (!configured).then(|| "SMTP not configured".to_string()),
    }
}

fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy".to_string()
    } else if checks.iter().any(|c| c.status == "degraded") {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(status: &str) -> ComponentHealth {
        ComponentHealth {
            name: "c".to_string(),
            status: status.to_string(),
            response_time_ms: None,
            error: None,
        }
    }

    #[test]
    fn test_determine_overall_status() {
        assert_eq!(determine_overall_status(&[component("healthy"), component("healthy")]), "healthy");
        assert_eq!(determine_overall_status(&[component("healthy"), component("degraded")]), "degraded");
        assert_eq!(determine_overall_status(&[component("unhealthy"), component("degraded")]), "unhealthy");
    }

    #[tokio::test]
    async fn test_detailed_without_mail_is_degraded() {
        let (ctx, _) = AppContext::for_tests().await;
        let (status, Json(health)) = health_detailed(State(ctx)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.checks[0].status, "healthy");
    }

    #[tokio::test]
    async fn test_detailed_hides_database_error() {
        let (ctx, _) = AppContext::for_tests().await;
        ctx.db.close().await;

        let (status, Json(health)) = health_detailed(State(ctx)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.checks[0].status, "unhealthy");
        assert_eq!(health.checks[0].error.as_deref(), Some("Database unavailable"));
    }
}
