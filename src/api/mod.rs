/// HTTP routes and handlers
pub mod admin;
pub mod auth;
pub mod cards;
pub mod events;
pub mod exports;
pub mod health;
pub mod middleware;

use crate::{
    account::ActiveSession,
    context::AppContext,
    error::{Notice, UserMessage},
    views::{layout::NoticeQuery, PageContext},
};
use axum::{
    extract::{rejection::FormRejection, Form},
    Router,
};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(events::routes())
        .merge(cards::routes())
        .merge(exports::routes())
        .merge(admin::routes())
}

/// Unwrap a submitted form; a body that does not parse is reported like a
/// validation failure on `location`.
pub(crate) fn parse_form<T>(form: Result<Form<T>, FormRejection>, location: &str) -> Result<T, UserMessage> {
    match form {
        Ok(Form(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!("Rejected form body: {}", rejection);
            Err(UserMessage::new(location, Notice::ValidationFailed))
        }
    }
}

/// Page context for the current request
pub(crate) fn page_context<'a>(
    ctx: &'a AppContext,
    session: Option<&'a ActiveSession>,
    query: &NoticeQuery,
) -> PageContext<'a> {
    PageContext::new(ctx.association_name(), session, query.notice())
}

/// Router-level tests share these helpers
#[cfg(test)]
pub(crate) mod testing {
    use crate::{auth::SESSION_COOKIE, context::AppContext, csrf::CSRF_FIELD, server::build_router};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response, StatusCode},
    };
    use tower::ServiceExt;

    /// Logged-in (or anonymous) browser state
    pub struct Client {
        pub session_id: String,
        pub csrf_token: String,
    }

    impl Client {
        /// Session for `user_id`, `None` for an anonymous visitor
        pub async fn new(ctx: &AppContext, user_id: Option<i64>) -> Self {
            let session = ctx.sessions.start(user_id).await.unwrap();
            Client {
                session_id: session.id,
                csrf_token: session.csrf_token,
            }
        }

        fn cookie(&self) -> String {
            format!("{}={}", SESSION_COOKIE, self.session_id)
        }

        pub async fn get(&self, ctx: &AppContext, uri: &str) -> Response<Body> {
            let request = Request::builder()
                .uri(uri)
                .header(header::COOKIE, self.cookie())
                .body(Body::empty())
                .unwrap();
            build_router(ctx.clone()).oneshot(request).await.unwrap()
        }

        /// POST a form with this session's CSRF token appended
        pub async fn post(&self, ctx: &AppContext, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
            let mut all: Vec<(&str, &str)> = fields.to_vec();
            all.push((CSRF_FIELD, self.csrf_token.as_str()));
            self.post_raw(ctx, uri, &all).await
        }

        /// POST exactly the given fields
        pub async fn post_raw(&self, ctx: &AppContext, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
            let body = fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::COOKIE, self.cookie())
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::REFERER, "http://localhost/events")
                .body(Body::from(body))
                .unwrap();
            build_router(ctx.clone()).oneshot(request).await.unwrap()
        }
    }

    pub fn location(response: &Response<Body>) -> String {
        assert_eq!(response.status(), StatusCode::FOUND);
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
