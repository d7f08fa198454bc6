/// CSRF protection for form posts
///
/// Each session row carries its own token. Every form renders it in a hidden
/// `csrf_token` field and [`csrf_guard`] checks it on every POST before the
/// request reaches a handler.
use crate::{
    account::ActiveSession,
    crypto,
    error::{AppError, AppResult, Notice, UserMessage},
    metrics,
};
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Name of the hidden form field
pub const CSRF_FIELD: &str = "csrf_token";

/// Largest form body accepted
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Compare a submitted token with the session's token
pub fn verify(session: Option<&ActiveSession>, submitted: Option<&str>) -> AppResult<()> {
    match (session, submitted) {
        (Some(session), Some(submitted)) if crypto::constant_time_eq(&session.csrf_token, submitted) => Ok(()),
        _ => Err(AppError::Csrf),
    }
}

/// Pull the `csrf_token` field out of an urlencoded body
pub fn token_from_form(body: &[u8]) -> Option<String> {
    let body = std::str::from_utf8(body).ok()?;
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != CSRF_FIELD {
            return None;
        }
        urlencoding::decode(&value.replace('+', " "))
            .ok()
            .map(|v| v.into_owned())
    })
}

/// Local path of the `Referer` header, `fallback` when absent or foreign.
///
/// Only the path and query are kept so a redirect built from it never leaves
/// the site.
pub fn referer_path(headers: &HeaderMap, fallback: &str) -> String {
    let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) else {
        return fallback.to_string();
    };

    let path = match referer.split_once("://") {
        Some((_, rest)) => match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        },
        None => referer,
    };

    if path.starts_with('/') && !path.starts_with("//") {
        strip_notice(path)
    } else {
        fallback.to_string()
    }
}

/// Drop a previous `notice` parameter so redirects don't stack them
fn strip_notice(path: &str) -> String {
    let Some((base, query)) = path.split_once('?') else {
        return path.to_string();
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("notice="))
        .collect();
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}

/// Reject POSTs whose `csrf_token` field does not match the session.
///
/// Runs after the session layer, which leaves the resolved session in the
/// request extensions. On mismatch nothing downstream runs and the client is
/// sent back to the referring page.
pub async fn csrf_guard(request: Request, next: Next) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return AppError::Validation("Form too large".to_string()).into_response(),
    };

    let session = parts.extensions.get::<ActiveSession>();
    let submitted = token_from_form(&bytes);

    if verify(session, submitted.as_deref()).is_err() {
        let path = parts.uri.path();
        tracing::warn!(path, "Rejected form post with invalid CSRF token");
        metrics::record_csrf_rejection(path);
        let back = referer_path(&parts.headers, "/");
        return UserMessage::new(back, Notice::InvalidCsrf).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
