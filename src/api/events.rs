/// Event pages and the registration endpoint
use crate::{
    api::{page_context, parse_form},
    auth::{CurrentUser, MaybeSession},
    context::AppContext,
    db::models::{Event, User},
    error::{AppResult, Notice, UserMessage},
    events::{RegistrationError, RegistrationOutcome},
    metrics,
    views::{
        self,
        events::{EventDetail, EventListing},
        layout::NoticeQuery,
    },
};
use axum::{
    extract::{rejection::FormRejection, Form, Path, Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(home))
        .route("/events", get(list_events))
        .route("/events/:id", get(show_event))
        .route("/event_register", get(register_get).post(register_post))
}

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub id: i64,
    pub action: String,
}

/// Attach remaining spots to each event
pub(crate) async fn listings(ctx: &AppContext, events: Vec<Event>) -> AppResult<Vec<EventListing>> {
    let mut listings = Vec::with_capacity(events.len());
    for event in events {
        let available = ctx.events.available_spots(&event).await?;
        listings.push(EventListing { event, available });
    }
    Ok(listings)
}

async fn home(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let events = listings(&ctx, ctx.events.list_published().await?).await?;
    let page = views::events::home_page(&page_context(&ctx, session.as_ref(), &query), &events);
    Ok(Html(page))
}

async fn list_events(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let events = listings(&ctx, ctx.events.list_published().await?).await?;
    let page = views::events::events_page(&page_context(&ctx, Some(&current.session), &query), &events);
    Ok(Html(page))
}

async fn show_event(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, UserMessage> {
    let not_found = || UserMessage::new("/events", Notice::EventNotFound);

    let event = ctx
        .events
        .find(id)
        .await
        .map_err(|e| e.at("/events"))?
        .ok_or_else(not_found)?;

    // Drafts stay hidden from everyone but admins
    if !event.is_published() && !current.user.is_admin() {
        return Err(not_found());
    }

    let detail = event_detail(&ctx, event, &current.user)
        .await
        .map_err(|e| e.at("/events"))?;
    let page = views::events::event_page(&page_context(&ctx, Some(&current.session), &query), &detail);
    Ok(Html(page))
}

async fn event_detail(ctx: &AppContext, event: Event, user: &User) -> AppResult<EventDetail> {
    let available = ctx.events.available_spots(&event).await?;

    let (registered, waitlist_position) = match user.member_id {
        Some(member_id) if ctx.events.is_registered(event.id, member_id).await? => {
            (true, ctx.events.waitlist_position(&event, member_id).await?)
        }
        _ => (false, None),
    };

    Ok(EventDetail {
        event,
        available,
        registered,
        waitlist_position,
        is_member: user.member_id.is_some(),
    })
}

/// A GET never registers anybody
async fn register_get(_current: CurrentUser, Query(query): Query<RegisterQuery>) -> UserMessage {
    match query.id.as_deref().and_then(|id| id.parse::<i64>().ok()) {
        Some(id) => UserMessage::new(format!("/events/{}", id), Notice::InvalidRequest),
        None => UserMessage::new("/events", Notice::InvalidRequest),
    }
}

/// Register or cancel, answering with a redirect to the event page
async fn register_post(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> UserMessage {
    let form = match parse_form(form, "/events") {
        Ok(form) => form,
        Err(_) => return UserMessage::new("/events", Notice::InvalidRequest),
    };
    let event_page = format!("/events/{}", form.id);

    match form.action.as_str() {
        "register" => register(&ctx, form.id, &current.user).await,
        "unregister" => unregister(&ctx, form.id, &current.user, event_page).await,
        _ => UserMessage::new(event_page, Notice::InvalidRequest),
    }
}

async fn register(ctx: &AppContext, event_id: i64, user: &User) -> UserMessage {
    let event_page = format!("/events/{}", event_id);

    match ctx.events.register(event_id, user).await {
        Ok(outcome) => {
            metrics::record_registration(outcome.as_str());
            send_confirmation(ctx, event_id, user, outcome).await;
            UserMessage::new(event_page, outcome.notice())
        }
        Err(e) => {
            metrics::record_registration(e.as_str());
            let location = match e {
                RegistrationError::EventNotFound => "/events".to_string(),
                _ => event_page,
            };
            e.at(location)
        }
    }
}

/// Mail the confirmation; failures are logged and never undo the registration
async fn send_confirmation(ctx: &AppContext, event_id: i64, user: &User, outcome: RegistrationOutcome) {
    let Some(member_id) = user.member_id else {
        return;
    };

    let lookup = async {
        let event = ctx.events.get(event_id).await?;
        let member = ctx.members.get(member_id).await?;
        Ok::<_, crate::error::AppError>((event, member))
    };

    let (event, member) = match lookup.await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(event_id, member_id, "Skipping registration confirmation: {}", e);
            return;
        }
    };

    if let Err(e) = ctx
        .notifier
        .send_registration_confirmation(&member.email, &member.name, &event, outcome)
        .await
    {
        tracing::warn!(event_id, member_id, "Failed to send registration confirmation: {}", e);
    }
}

async fn unregister(ctx: &AppContext, event_id: i64, user: &User, event_page: String) -> UserMessage {
    let Some(member_id) = user.member_id else {
        return UserMessage::new(event_page, Notice::NotRegistered);
    };

    match ctx.events.unregister(event_id, member_id).await {
        Ok(true) => {
            metrics::record_registration("unregistered");
            UserMessage::new(event_page, Notice::Unregistered)
        }
        Ok(false) => UserMessage::new(event_page, Notice::NotRegistered),
        Err(e) => {
            tracing::error!(event_id, member_id, "Failed to cancel registration: {}", e);
            UserMessage::new(event_page, Notice::UnregisterFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::testing::{body_text, location, Client},
        context::AppContext,
        events::manager::tests::{event_form, member_user},
    };
    use axum::http::StatusCode;

    async fn registration_count(ctx: &AppContext, event_id: i64) -> i64 {
        ctx.events.registration_count(event_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_register_twice_reports_already_registered() {
        let (ctx, notifier) = AppContext::for_tests().await;
        let event = ctx.events.create(&event_form("Concert", None, true)).await.unwrap();
        let user = member_user(&ctx.db, "Ada", "001").await;
        let client = Client::new(&ctx, Some(user.id)).await;
        let id = event.id.to_string();

        let first = client
            .post(&ctx, "/event_register", &[("id", id.as_str()), ("action", "register")])
            .await;
        assert_eq!(location(&first), format!("/events/{}?notice=registered", event.id));

        let second = client
            .post(&ctx, "/event_register", &[("id", id.as_str()), ("action", "register")])
            .await;
        assert_eq!(location(&second), format!("/events/{}?notice=already_registered", event.id));

        assert_eq!(registration_count(&ctx, event.id).await, 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Registration: Concert");
    }

    #[tokio::test]
    async fn test_unregister_without_registration_is_success_style() {
        let (ctx, _) = AppContext::for_tests().await;
        let event = ctx.events.create(&event_form("Concert", None, true)).await.unwrap();
        let user = member_user(&ctx.db, "Ada", "001").await;
        let client = Client::new(&ctx, Some(user.id)).await;

        let response = client
            .post(&ctx, "/event_register", &[("id", event.id.to_string().as_str()), ("action", "unregister")])
            .await;

        assert_eq!(location(&response), format!("/events/{}?notice=not_registered", event.id));
    }

    #[tokio::test]
    async fn test_eleventh_registration_is_waitlisted() {
        let (ctx, notifier) = AppContext::for_tests().await;
        let event = ctx.events.create(&event_form("Workshop", Some(10), true)).await.unwrap();
        let id = event.id.to_string();

        for n in 0..10 {
            let user = member_user(&ctx.db, &format!("Member {}", n), &format!("{:03}", n)).await;
            let client = Client::new(&ctx, Some(user.id)).await;
            let response = client
                .post(&ctx, "/event_register", &[("id", id.as_str()), ("action", "register")])
                .await;
            assert!(location(&response).ends_with("notice=registered"));
        }

        let late = member_user(&ctx.db, "Late", "999").await;
        let client = Client::new(&ctx, Some(late.id)).await;
        let response = client
            .post(&ctx, "/event_register", &[("id", id.as_str()), ("action", "register")])
            .await;
        assert_eq!(location(&response), format!("/events/{}?notice=waitlisted", event.id));

        assert_eq!(registration_count(&ctx, event.id).await, 11);
        let event = ctx.events.get(event.id).await.unwrap();
        assert_eq!(ctx.events.available_spots(&event).await.unwrap(), Some(0));
        assert_eq!(notifier.sent().last().unwrap().body, "waitlisted");

        let page = client.get(&ctx, &format!("/events/{}", event.id)).await;
        assert_eq!(page.status(), StatusCode::OK);
        assert!(body_text(page).await.contains("number 1 on the waiting list"));
    }

    #[tokio::test]
    async fn test_tampered_csrf_token_does_not_register() {
        let (ctx, _) = AppContext::for_tests().await;
        let event = ctx.events.create(&event_form("Concert", None, true)).await.unwrap();
        let user = member_user(&ctx.db, "Ada", "001").await;
        let client = Client::new(&ctx, Some(user.id)).await;
        let id = event.id.to_string();

        let tampered = client
            .post_raw(
                &ctx,
                "/event_register",
                &[("id", id.as_str()), ("action", "register"), ("csrf_token", "0".repeat(64).as_str())],
            )
            .await;
        assert_eq!(location(&tampered), "/events?notice=invalid_csrf");

        let missing = client
            .post_raw(&ctx, "/event_register", &[("id", id.as_str()), ("action", "register")])
            .await;
        assert_eq!(location(&missing), "/events?notice=invalid_csrf");

        assert_eq!(registration_count(&ctx, event.id).await, 0);
    }

    #[tokio::test]
    async fn test_get_register_never_mutates() {
        let (ctx, _) = AppContext::for_tests().await;
        let event = ctx.events.create(&event_form("Concert", None, true)).await.unwrap();
        let user = member_user(&ctx.db, "Ada", "001").await;
        let client = Client::new(&ctx, Some(user.id)).await;

        let response = client
            .get(&ctx, &format!("/event_register?id={}&action=register", event.id))
            .await;

        assert_eq!(location(&response), format!("/events/{}?notice=invalid_request", event.id));
        assert_eq!(registration_count(&ctx, event.id).await, 0);
    }

    #[tokio::test]
    async fn test_missing_event_redirects_to_list() {
        let (ctx, _) = AppContext::for_tests().await;
        let user = member_user(&ctx.db, "Ada", "001").await;
        let client = Client::new(&ctx, Some(user.id)).await;

        let response = client.get(&ctx, "/events/4242").await;
        assert_eq!(location(&response), "/events?notice=event_not_found");

        let response = client
            .post(&ctx, "/event_register", &[("id", "4242"), ("action", "register")])
            .await;
        assert_eq!(location(&response), "/events?notice=event_not_found");
    }

    #[tokio::test]
    async fn test_events_require_login() {
        let (ctx, _) = AppContext::for_tests().await;
        let anonymous = Client::new(&ctx, None).await;

        let response = anonymous.get(&ctx, "/events").await;
        assert_eq!(location(&response), "/login?notice=login_required");
    }
}
