/// HTTP server setup and routing
use crate::{
    api::middleware::track_metrics,
    auth::session_layer,
    context::AppContext,
    csrf::csrf_guard,
    error::{AppError, AppResult},
    rate_limit::rate_limit_middleware,
    views::layout::error_page,
};
use axum::{
    http::StatusCode,
    middleware,
    response::Html,
    Router,
};
use std::net::SocketAddr;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::info;

/// Build the main application router
///
/// Layers run outside-in: tracing, compression, metrics, rate limiting,
/// session lookup, then the CSRF check right before the handler.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn(csrf_guard))
        .layer(middleware::from_fn_with_state(ctx.clone(), session_layer))
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// 404 handler
async fn not_found() -> (StatusCode, Html<String>) {
    (
        StatusCode::NOT_FOUND,
        Html(error_page("Not found", "The page you are looking for does not exist.")),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> AppResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Tessera listening on {}", addr);
    info!("   Association: {}", ctx.association_name());
    info!("   Public URL: {}", ctx.public_url());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // Client addresses feed the rate limiter
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::body_text;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_unknown_path_is_html_404() {
        let (ctx, _) = AppContext::for_tests().await;
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();

        let response = build_router(ctx).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("does not exist"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (ctx, _) = AppContext::for_tests().await;
        let request = Request::builder().uri("/health/ready").body(Body::empty()).unwrap();

        let response = build_router(ctx).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
