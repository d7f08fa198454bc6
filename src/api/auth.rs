/// Login, logout and password recovery
use crate::{
    api::{page_context, parse_form},
    auth::{ensure_session, removal_cookie, session_cookie, MaybeSession},
    context::AppContext,
    error::{AppError, Notice, UserMessage},
    mailer::Delivery,
    metrics,
    views::{self, layout::NoticeQuery},
};
use axum::{
    extract::{rejection::FormRejection, Form, Query, State},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/logout", axum::routing::post(logout))
        .route("/forgot_password", get(forgot_password_form).post(forgot_password))
        .route("/reset_password", get(reset_password_form).post(reset_password))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetTokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

async fn login_form(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
    Query(query): Query<NoticeQuery>,
) -> Result<(CookieJar, Html<String>), AppError> {
    let (session, jar) = ensure_session(&ctx, session, jar).await?;
    let page = views::auth::login_page(&page_context(&ctx, Some(&session), &query));
    Ok((jar, Html(page)))
}

/// Check credentials and replace the session with an authenticated one
async fn login(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<(CookieJar, UserMessage), UserMessage> {
    let form = parse_form(form, "/login")?;

    let user = match ctx.accounts.authenticate(&form.email, &form.password).await {
        Ok(user) => user,
        Err(AppError::Authentication(_)) => {
            metrics::record_login(false);
            tracing::info!("Failed login attempt");
            return Err(UserMessage::new("/login", Notice::LoginFailed));
        }
        Err(e) => return Err(e.at("/login")),
    };

    let fresh = ctx
        .sessions
        .rotate(session.as_ref().map(|s| s.id.as_str()), user.id)
        .await
        .map_err(|e| e.at("/login"))?;

    metrics::record_login(true);
    tracing::info!(user_id = user.id, "User logged in");

    let jar = jar.add(session_cookie(&fresh.id, &ctx.config.session));
    Ok((jar, UserMessage::new("/events", Notice::LoggedIn)))
}

async fn logout(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> Result<(CookieJar, UserMessage), UserMessage> {
    if let Some(session) = session {
        ctx.sessions.destroy(&session.id).await.map_err(|e| e.at("/"))?;
        if let Some(user) = &session.user {
            tracing::info!(user_id = user.id, "User logged out");
        }
    }

    Ok((jar.remove(removal_cookie()), UserMessage::new("/login", Notice::LoggedOut)))
}

async fn forgot_password_form(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
    Query(query): Query<NoticeQuery>,
) -> Result<(CookieJar, Html<String>), AppError> {
    let (session, jar) = ensure_session(&ctx, session, jar).await?;
    let page = views::auth::forgot_password_page(&page_context(&ctx, Some(&session), &query), None);
    Ok((jar, Html(page)))
}

/// Issue a reset token and mail the link.
///
/// Known and unknown addresses get the same redirect. Only when the link
/// could not be mailed and the development fallback is on does the page
/// show the link itself.
async fn forgot_password(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    form: Result<Form<ForgotPasswordForm>, FormRejection>,
) -> Result<Response, UserMessage> {
    let form = parse_form(form, "/forgot_password")?;
    let requested = UserMessage::new("/forgot_password", Notice::ResetRequested);

    let issued = ctx
        .accounts
        .request_password_reset(&form.email)
        .await
        .map_err(|e| e.at("/forgot_password"))?;

    let Some(issued) = issued else {
        metrics::record_password_reset("request", false);
        return Ok(requested.into_response());
    };

    let reset_url = format!("{}/reset_password?token={}", ctx.public_url(), issued.token);
    let delivered = match ctx.notifier.send_password_reset(&issued.user.email, &reset_url).await {
        Ok(Delivery::Sent) => true,
        Ok(Delivery::Skipped) => false,
        Err(e) => {
            tracing::error!(user_id = issued.user.id, "Failed to send reset email: {}", e);
            false
        }
    };
    metrics::record_password_reset("request", true);

    if !delivered && ctx.config.password_reset.expose_link_fallback {
        tracing::warn!(user_id = issued.user.id, "Reset link shown in page, mail unavailable");
        let page_ctx = page_context(&ctx, session.as_ref(), &NoticeQuery::default());
        let page = views::auth::forgot_password_page(&page_ctx, Some(&reset_url));
        return Ok(Html(page).into_response());
    }

    Ok(requested.into_response())
}

/// New-password form, only for a live token
async fn reset_password_form(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
    Query(token): Query<ResetTokenQuery>,
    Query(query): Query<NoticeQuery>,
) -> Result<(CookieJar, Html<String>), UserMessage> {
    let invalid = || UserMessage::new("/forgot_password", Notice::ResetTokenInvalid);
    let token = token.token.ok_or_else(invalid)?;

    let valid = ctx
        .accounts
        .is_reset_token_valid(&token)
        .await
        .map_err(|e| e.at("/forgot_password"))?;
    if !valid {
        return Err(invalid());
    }

    let (session, jar) = ensure_session(&ctx, session, jar)
        .await
        .map_err(|e| e.at("/forgot_password"))?;
    let page = views::auth::reset_password_page(&page_context(&ctx, Some(&session), &query), &token);
    Ok((jar, Html(page)))
}

async fn reset_password(
    State(ctx): State<AppContext>,
    form: Result<Form<ResetPasswordForm>, FormRejection>,
) -> Result<UserMessage, UserMessage> {
    let form = parse_form(form, "/forgot_password")?;
    let retry = format!("/reset_password?token={}", urlencoding::encode(&form.token));

    if form.password != form.password_confirm {
        return Err(UserMessage::new(retry, Notice::PasswordMismatch));
    }
    if crate::crypto::password::validate_password_strength(&form.password).is_err() {
        return Err(UserMessage::new(retry, Notice::PasswordTooShort));
    }

    match ctx.accounts.reset_password(&form.token, &form.password).await {
        Ok(_) => {
            metrics::record_password_reset("redeem", true);
            Ok(UserMessage::new("/login", Notice::PasswordChanged))
        }
        Err(AppError::Validation(_)) => {
            metrics::record_password_reset("redeem", false);
            Err(UserMessage::new("/forgot_password", Notice::ResetTokenInvalid))
        }
        Err(e) => Err(e.at("/forgot_password")),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::testing::{body_text, location, Client},
        auth::SESSION_COOKIE,
        context::AppContext,
        db::models::Role,
    };
    use axum::http::{header, StatusCode};

    async fn user(ctx: &AppContext, email: &str) -> i64 {
        ctx.accounts
            .create_user(email, "password123", Role::Member, None)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_login_rotates_session() {
        let (ctx, _) = AppContext::for_tests().await;
        user(&ctx, "ada@example.org").await;
        let anonymous = Client::new(&ctx, None).await;

        let response = anonymous
            .post(&ctx, "/login", &[("email", "ada@example.org"), ("password", "password123")])
            .await;

        assert!(location(&response).starts_with("/events"));
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(SESSION_COOKIE));
        assert!(!cookie.contains(&anonymous.session_id));
        assert!(ctx.sessions.load(&anonymous.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failure() {
        let (ctx, _) = AppContext::for_tests().await;
        user(&ctx, "ada@example.org").await;
        let anonymous = Client::new(&ctx, None).await;

        let response = anonymous
            .post(&ctx, "/login", &[("email", "ada@example.org"), ("password", "wrong-password")])
            .await;

        assert_eq!(location(&response), "/login?notice=login_failed");
    }

    #[tokio::test]
    async fn test_login_page_starts_anonymous_session() {
        let (ctx, _) = AppContext::for_tests().await;
        let request = axum::http::Request::builder()
            .uri("/login")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(crate::server::build_router(ctx), request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        assert!(body_text(response).await.contains("csrf_token"));
    }

    #[tokio::test]
    async fn test_forgot_password_same_answer_for_unknown_email() {
        let (ctx, notifier) = AppContext::for_tests().await;
        user(&ctx, "ada@example.org").await;
        let anonymous = Client::new(&ctx, None).await;

        let known = anonymous
            .post(&ctx, "/forgot_password", &[("email", "ada@example.org")])
            .await;
        let unknown = anonymous
            .post(&ctx, "/forgot_password", &[("email", "nobody@example.org")])
            .await;

        assert_eq!(location(&known), location(&unknown));
        assert_eq!(location(&known), "/forgot_password?notice=reset_requested");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.org");
        assert!(sent[0].body.starts_with("http://localhost:8080/reset_password?token="));
    }

    #[tokio::test]
    async fn test_reset_link_shown_when_mail_fails() {
        let (ctx, _) = AppContext::for_tests().await;
        let notifier = std::sync::Arc::new(crate::mailer::tests::RecordingNotifier::failing());
        let ctx = AppContext::with_services((*ctx.config).clone(), ctx.db.clone(), notifier);
        user(&ctx, "ada@example.org").await;
        let anonymous = Client::new(&ctx, None).await;

        let response = anonymous
            .post(&ctx, "/forgot_password", &[("email", "ada@example.org")])
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("/reset_password?token="));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let (ctx, notifier) = AppContext::for_tests().await;
        user(&ctx, "ada@example.org").await;
        let anonymous = Client::new(&ctx, None).await;

        anonymous
            .post(&ctx, "/forgot_password", &[("email", "ada@example.org")])
            .await;
        let link = notifier.sent()[0].body.clone();
        let token = link.rsplit('=').next().unwrap().to_string();

        let form = anonymous
            .get(&ctx, &format!("/reset_password?token={}", token))
            .await;
        assert_eq!(form.status(), StatusCode::OK);

        let mismatch = anonymous
            .post(
                &ctx,
                "/reset_password",
                &[("token", token.as_str()), ("password", "new-password"), ("password_confirm", "other-password")],
            )
            .await;
        assert!(location(&mismatch).ends_with("notice=password_mismatch"));

        let done = anonymous
            .post(
                &ctx,
                "/reset_password",
                &[("token", token.as_str()), ("password", "new-password"), ("password_confirm", "new-password")],
            )
            .await;
        assert_eq!(location(&done), "/login?notice=password_changed");
        assert!(ctx.accounts.authenticate("ada@example.org", "new-password").await.is_ok());

        let reused = anonymous
            .get(&ctx, &format!("/reset_password?token={}", token))
            .await;
        assert_eq!(location(&reused), "/forgot_password?notice=reset_token_invalid");
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let (ctx, _) = AppContext::for_tests().await;
        let id = user(&ctx, "ada@example.org").await;
        let client = Client::new(&ctx, Some(id)).await;

        let response = client.post(&ctx, "/logout", &[]).await;

        assert_eq!(location(&response), "/login?notice=logged_out");
        assert!(ctx.sessions.load(&client.session_id).await.unwrap().is_none());
    }
}
