/// Session cookie handling and authentication extractors
use crate::{
    account::ActiveSession,
    config::SessionConfig,
    context::AppContext,
    db::models::User,
    error::{AppError, AppResult, Notice, UserMessage},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "tessera_session";

/// Resolve the session cookie and leave the [`ActiveSession`] in the request
/// extensions for the extractors below and the CSRF guard.
pub async fn session_layer(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match ctx.sessions.load(cookie.value()).await {
            Ok(Some(session)) => {
                request.extensions_mut().insert(session);
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to load session: {}", e),
        }
    }

    next.run(request).await
}

/// Cookie carrying a session id
pub fn session_cookie(id: &str, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .max_age(time::Duration::hours(config.ttl_hours))
        .build()
}

/// Cookie that clears the session on the client
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Return the current session, starting an anonymous one when there is none.
///
/// Pages with forms call this so even anonymous visitors get a CSRF token.
pub async fn ensure_session(
    ctx: &AppContext,
    existing: Option<ActiveSession>,
    jar: CookieJar,
) -> AppResult<(ActiveSession, CookieJar)> {
    match existing {
        Some(session) => Ok((session, jar)),
        None => {
            let session = ctx.sessions.start(None).await?;
            let jar = jar.add(session_cookie(&session.id, &ctx.config.session));
            Ok((session, jar))
        }
    }
}

/// Session if the request has one, authenticated or not
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<ActiveSession>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(parts.extensions.get::<ActiveSession>().cloned()))
    }
}

/// Logged-in user; anonymous requests are redirected to the login page
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session: ActiveSession,
    pub user: User,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = UserMessage;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<ActiveSession>()
            .cloned()
            .ok_or_else(|| UserMessage::new("/login", Notice::LoginRequired))?;

        match session.user.clone() {
            Some(user) => Ok(CurrentUser { session, user }),
            None => Err(UserMessage::new("/login", Notice::LoginRequired)),
        }
    }
}

/// Logged-in administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if !current.user.is_admin() {
            tracing::warn!(user_id = current.user.id, path = parts.uri.path(), "Admin page refused");
            return Err(AppError::Authorization("Admin role required".to_string()).into_response());
        }

        Ok(AdminUser(current))
    }
}
