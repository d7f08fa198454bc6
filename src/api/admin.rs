/// Admin pages: members, events, social years with fee payments, ledger
use crate::{
    api::{events::listings, page_context, parse_form},
    auth::AdminUser,
    context::AppContext,
    csrf::referer_path,
    db::models::{EventStatus, MemberStatus},
    error::{AppResult, Notice, UserMessage},
    events::NewEvent,
    fees::{NewPayment, NewSocialYear},
    ledger::NewLedgerEntry,
    members::{MemberFilter, NewMember},
    validation::validate_form,
    views::{self, layout::NoticeQuery},
};
use axum::{
    extract::{rejection::FormRejection, Form, Path, Query, State},
    http::HeaderMap,
    response::Html,
    routing::{get, post},
    Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;

const MEMBERS: &str = "/admin/members";
const EVENTS: &str = "/admin/events";
const SOCIAL_YEARS: &str = "/admin/social_years";
const LEDGER: &str = "/admin/ledger";

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(MEMBERS, get(list_members).post(create_member))
        .route("/admin/members/:id/activate", post(activate_member))
        .route("/admin/members/:id/deactivate", post(deactivate_member))
        .route("/admin/members/:id/rotate_card", post(rotate_card))
        .route(EVENTS, get(list_events).post(create_event))
        .route("/admin/events/:id", get(show_event))
        .route("/admin/events/:id/publish", post(publish_event))
        .route("/admin/events/:id/unpublish", post(unpublish_event))
        .route(SOCIAL_YEARS, get(list_social_years).post(create_social_year))
        .route("/admin/social_years/:id/activate", post(activate_social_year))
        .route("/admin/payments", post(record_payment))
        .route("/admin/payments/:id/delete", post(delete_payment))
        .route(LEDGER, get(show_ledger).post(add_ledger_entry))
}

#[derive(Debug, Default, Deserialize)]
pub struct SocialYearQuery {
    pub year: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub year: Option<i32>,
}

// Members

async fn list_members(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Query(filter): Query<MemberFilter>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let members = ctx.members.list(&filter).await?;
    let page_ctx = page_context(&ctx, Some(&admin.session), &query);
    Ok(Html(views::admin::members_page(&page_ctx, &members, &filter)))
}

/// Create a member, and a member login when a password was given
async fn create_member(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    form: Result<Form<NewMember>, FormRejection>,
) -> Result<UserMessage, UserMessage> {
    let new = parse_form(form, MEMBERS)?;
    validate_form(&new).map_err(|e| e.at(MEMBERS))?;

    ctx.members.create(&new).await.map_err(|e| e.at(MEMBERS))?;

    Ok(UserMessage::new(MEMBERS, Notice::MemberSaved))
}

async fn set_member_status(ctx: &AppContext, id: i64, status: MemberStatus) -> Result<UserMessage, UserMessage> {
    ctx.members.set_status(id, status).await.map_err(|e| e.at(MEMBERS))?;
    Ok(UserMessage::new(MEMBERS, Notice::MemberStatusChanged))
}

async fn activate_member(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    set_member_status(&ctx, id, MemberStatus::Active).await
}

async fn deactivate_member(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    set_member_status(&ctx, id, MemberStatus::Inactive).await
}

/// Issue a new card token; the printed card stops verifying
async fn rotate_card(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    ctx.members.rotate_card_token(id).await.map_err(|e| e.at(MEMBERS))?;
    Ok(UserMessage::new(MEMBERS, Notice::CardRotated))
}

// Events

async fn list_events(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let events = listings(&ctx, ctx.events.list_all().await?).await?;
    let page_ctx = page_context(&ctx, Some(&admin.session), &query);
    Ok(Html(views::admin::events_page(&page_ctx, &events)))
}

async fn create_event(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    form: Result<Form<NewEvent>, FormRejection>,
) -> Result<UserMessage, UserMessage> {
    let new = parse_form(form, EVENTS)?;
    validate_form(&new).map_err(|e| e.at(EVENTS))?;

    ctx.events.create(&new).await.map_err(|e| e.at(EVENTS))?;
    Ok(UserMessage::new(EVENTS, Notice::EventSaved))
}

/// Event with its registrations in order
async fn show_event(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, UserMessage> {
    let event = ctx.events.get(id).await.map_err(|e| e.at(EVENTS))?;
    let registrations = ctx.events.registrations(id).await.map_err(|e| e.at(EVENTS))?;

    let page_ctx = page_context(&ctx, Some(&admin.session), &query);
    Ok(Html(views::admin::event_page(&page_ctx, &event, &registrations)))
}

async fn publish_event(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    ctx.events
        .set_status(id, EventStatus::Published)
        .await
        .map_err(|e| e.at(EVENTS))?;
    Ok(UserMessage::new(EVENTS, Notice::EventPublished))
}

async fn unpublish_event(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    ctx.events
        .set_status(id, EventStatus::Draft)
        .await
        .map_err(|e| e.at(EVENTS))?;
    Ok(UserMessage::new(EVENTS, Notice::EventUnpublished))
}

// Social years and fees

/// Years list plus the payments of the selected year (default: current)
async fn list_social_years(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Query(selection): Query<SocialYearQuery>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let years = ctx.fees.list_social_years().await?;

    let shown = match selection.year {
        Some(id) => years.iter().find(|y| y.id == id),
        None => years.iter().find(|y| y.is_current).or_else(|| years.first()),
    };

    let payments = match shown {
        Some(year) => ctx.fees.payments_for_social_year(year.id).await?,
        None => Vec::new(),
    };
    let members = ctx.members.list_active(false).await?;

    let page_ctx = page_context(&ctx, Some(&admin.session), &query);
    Ok(Html(views::admin::social_years_page(&page_ctx, &years, shown, &payments, &members)))
}

async fn create_social_year(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    form: Result<Form<NewSocialYear>, FormRejection>,
) -> Result<UserMessage, UserMessage> {
    let new = parse_form(form, SOCIAL_YEARS)?;
    validate_form(&new).map_err(|e| e.at(SOCIAL_YEARS))?;

    let year = ctx
        .fees
        .create_social_year(&new)
        .await
        .map_err(|e| e.at(SOCIAL_YEARS))?;
    Ok(UserMessage::new(
        format!("{}?year={}", SOCIAL_YEARS, year.id),
        Notice::SocialYearSaved,
    ))
}

async fn activate_social_year(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    ctx.fees.set_current(id).await.map_err(|e| e.at(SOCIAL_YEARS))?;
    Ok(UserMessage::new(SOCIAL_YEARS, Notice::SocialYearActivated))
}

async fn record_payment(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    form: Result<Form<NewPayment>, FormRejection>,
) -> Result<UserMessage, UserMessage> {
    let new = parse_form(form, SOCIAL_YEARS)?;
    let back = format!("{}?year={}", SOCIAL_YEARS, new.social_year_id);
    validate_form(&new).map_err(|e| e.at(back.clone()))?;

    ctx.fees.record_payment(&new).await.map_err(|e| e.at(back.clone()))?;
    Ok(UserMessage::new(back, Notice::PaymentRecorded))
}

async fn delete_payment(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<UserMessage, UserMessage> {
    let back = referer_path(&headers, SOCIAL_YEARS);

    if ctx.fees.delete_payment(id).await.map_err(|e| e.at(back.clone()))? {
        Ok(UserMessage::new(back, Notice::PaymentDeleted))
    } else {
        Err(UserMessage::new(back, Notice::NotFound))
    }
}

// Ledger

async fn show_ledger(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Query(selection): Query<LedgerQuery>,
    Query(query): Query<NoticeQuery>,
) -> AppResult<Html<String>> {
    let year = selection.year.unwrap_or_else(|| Utc::now().year());
    let entries = ctx.ledger.list_for_year(year).await?;

    let page_ctx = page_context(&ctx, Some(&admin.session), &query);
    Ok(Html(views::admin::ledger_page(&page_ctx, year, &entries)))
}

async fn add_ledger_entry(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    form: Result<Form<NewLedgerEntry>, FormRejection>,
) -> Result<UserMessage, UserMessage> {
    let new = parse_form(form, LEDGER)?;
    validate_form(&new).map_err(|e| e.at(LEDGER))?;

    let entry = ctx.ledger.add(&new).await.map_err(|e| e.at(LEDGER))?;
    Ok(UserMessage::new(
        format!("{}?year={}", LEDGER, entry.entry_date.year()),
        Notice::LedgerEntrySaved,
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::testing::{body_text, location, Client},
        context::AppContext,
        db::models::{MemberStatus, Role},
        events::manager::tests::member_user,
    };
    use axum::http::StatusCode;

    async fn admin_client(ctx: &AppContext) -> Client {
        let admin = ctx
            .accounts
            .create_user("admin@example.org", "password123", Role::Admin, None)
            .await
            .unwrap();
        Client::new(ctx, Some(admin.id)).await
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let (ctx, _) = AppContext::for_tests().await;
        let user = member_user(&ctx.db, "Ada", "001").await;
        let client = Client::new(&ctx, Some(user.id)).await;

        let page = client.get(&ctx, "/admin/members").await;
        assert_eq!(page.status(), StatusCode::FORBIDDEN);

        let post = client
            .post(&ctx, &format!("/admin/members/{}/deactivate", user.member_id.unwrap()), &[])
            .await;
        assert_eq!(post.status(), StatusCode::FORBIDDEN);
        assert!(ctx.members.get(user.member_id.unwrap()).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_create_member_with_login() {
        let (ctx, _) = AppContext::for_tests().await;
        let client = admin_client(&ctx).await;

        let response = client
            .post(
                &ctx,
                "/admin/members",
                &[
                    ("name", "Ada Lovelace"),
                    ("email", "ada@example.org"),
                    ("membership_number", "A-1"),
                    ("fiscal_code", ""),
                    ("photo_url", ""),
                    ("login_password", "password123"),
                ],
            )
            .await;
        assert_eq!(location(&response), "/admin/members?notice=member_saved");

        let user = ctx.accounts.authenticate("ada@example.org", "password123").await.unwrap();
        assert!(user.member_id.is_some());

        let duplicate = client
            .post(
                &ctx,
                "/admin/members",
                &[("name", "Other"), ("email", "other@example.org"), ("membership_number", "A-1")],
            )
            .await;
        assert_eq!(location(&duplicate), "/admin/members?notice=duplicate");
    }

    #[tokio::test]
    async fn test_member_with_taken_login_email_is_not_saved() {
        let (ctx, _) = AppContext::for_tests().await;
        let client = admin_client(&ctx).await;

        let response = client
            .post(
                &ctx,
                "/admin/members",
                &[
                    ("name", "Impostor"),
                    ("email", "admin@example.org"),
                    ("membership_number", "A-9"),
                    ("login_password", "password123"),
                ],
            )
            .await;

        assert_eq!(location(&response), "/admin/members?notice=duplicate");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&ctx.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_invalid_member_form() {
        let (ctx, _) = AppContext::for_tests().await;
        let client = admin_client(&ctx).await;

        let response = client
            .post(
                &ctx,
                "/admin/members",
                &[("name", "Ada"), ("email", "not-an-email"), ("membership_number", "A-1")],
            )
            .await;
        assert_eq!(location(&response), "/admin/members?notice=validation_failed");
    }

    #[tokio::test]
    async fn test_deactivate_and_rotate() {
        let (ctx, _) = AppContext::for_tests().await;
        let user = member_user(&ctx.db, "Ada", "001").await;
        let member_id = user.member_id.unwrap();
        let before = ctx.members.get(member_id).await.unwrap();
        let client = admin_client(&ctx).await;

        let response = client
            .post(&ctx, &format!("/admin/members/{}/deactivate", member_id), &[])
            .await;
        assert_eq!(location(&response), "/admin/members?notice=member_status_changed");
        assert_eq!(ctx.members.get(member_id).await.unwrap().status, MemberStatus::Inactive);

        client
            .post(&ctx, &format!("/admin/members/{}/rotate_card", member_id), &[])
            .await;
        assert_ne!(ctx.members.get(member_id).await.unwrap().card_token, before.card_token);
    }

    #[tokio::test]
    async fn test_event_lifecycle() {
        let (ctx, _) = AppContext::for_tests().await;
        let client = admin_client(&ctx).await;

        let response = client
            .post(
                &ctx,
                "/admin/events",
                &[
                    ("title", "Assemblea"),
                    ("description", "Annual meeting"),
                    ("event_date", "2030-04-10"),
                    ("event_time", "18:00"),
                    ("mode", "hybrid"),
                    ("location", ""),
                    ("cost", ""),
                    ("capacity", "50"),
                ],
            )
            .await;
        assert_eq!(location(&response), "/admin/events?notice=event_saved");

        let event = ctx.events.list_all().await.unwrap().remove(0);
        assert!(!event.is_published());

        client
            .post(&ctx, &format!("/admin/events/{}/publish", event.id), &[])
            .await;
        assert!(ctx.events.get(event.id).await.unwrap().is_published());

        let page = client.get(&ctx, &format!("/admin/events/{}", event.id)).await;
        assert_eq!(page.status(), StatusCode::OK);
        assert!(body_text(page).await.contains("capacity 50"));
    }

    #[tokio::test]
    async fn test_social_year_and_payment() {
        let (ctx, _) = AppContext::for_tests().await;
        let user = member_user(&ctx.db, "Ada", "001").await;
        let member_id = user.member_id.unwrap();
        let client = admin_client(&ctx).await;

        let response = client
            .post(
                &ctx,
                "/admin/social_years",
                &[
                    ("name", "2030"),
                    ("start_date", "2030-01-01"),
                    ("end_date", "2030-12-31"),
                    ("make_current", "on"),
                ],
            )
            .await;
        let year = ctx.fees.current_social_year().await.unwrap().unwrap();
        assert_eq!(
            location(&response),
            format!("/admin/social_years?year={}&notice=social_year_saved", year.id)
        );

        let response = client
            .post(
                &ctx,
                "/admin/payments",
                &[
                    ("member_id", member_id.to_string().as_str()),
                    ("social_year_id", year.id.to_string().as_str()),
                    ("paid_date", "2030-02-01"),
                    ("amount", "25.00"),
                ],
            )
            .await;
        assert_eq!(
            location(&response),
            format!("/admin/social_years?year={}&notice=payment_recorded", year.id)
        );
        assert!(ctx.fees.has_paid_current_year(member_id).await.unwrap());

        let reversed = client
            .post(
                &ctx,
                "/admin/social_years",
                &[("name", "Bad"), ("start_date", "2031-12-31"), ("end_date", "2031-01-01")],
            )
            .await;
        assert_eq!(location(&reversed), "/admin/social_years?notice=validation_failed");
    }

    #[tokio::test]
    async fn test_ledger_entry() {
        let (ctx, _) = AppContext::for_tests().await;
        let client = admin_client(&ctx).await;

        let response = client
            .post(
                &ctx,
                "/admin/ledger",
                &[
                    ("kind", "income"),
                    ("entry_date", "2030-07-14"),
                    ("description", "Donation"),
                    ("category", ""),
                    ("amount", "40"),
                ],
            )
            .await;
        assert_eq!(location(&response), "/admin/ledger?year=2030&notice=ledger_entry_saved");

        let page = body_text(client.get(&ctx, "/admin/ledger?year=2030").await).await;
        assert!(page.contains("Donation"));
    }
}
