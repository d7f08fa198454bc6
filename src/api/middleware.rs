/// Request instrumentation middleware
use crate::metrics;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Count requests and time them per route template.
///
/// Labels use the matched route (`/events/:id`) rather than the raw path
/// so ids and tokens never become label values.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics::record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}
