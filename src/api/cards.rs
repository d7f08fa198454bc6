/// Membership card pages
use crate::{
    api::page_context,
    auth::{CurrentUser, MaybeSession},
    context::AppContext,
    error::{AppResult, Notice, UserMessage},
    verification::{card_status, card_url},
    views::{self, layout::NoticeQuery},
};
use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/verify_member", get(verify_member))
        .route("/card", get(own_card))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub token: String,
}

/// Public page reached by scanning a card's QR code
async fn verify_member(
    State(ctx): State<AppContext>,
    MaybeSession(session): MaybeSession,
    Query(verify): Query<VerifyQuery>,
) -> AppResult<Html<String>> {
    let verification = ctx.verifier.verify(&verify.token).await?;
    let page_ctx = page_context(&ctx, session.as_ref(), &NoticeQuery::default());
    Ok(Html(views::members::verify_page(&page_ctx, &verification)))
}

async fn own_card(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, UserMessage> {
    let member_id = current
        .user
        .member_id
        .ok_or_else(|| UserMessage::new("/events", Notice::NotAMember))?;

    let member = ctx.members.get(member_id).await.map_err(|e| e.at("/events"))?;
    let paid = ctx
        .fees
        .has_paid_current_year(member.id)
        .await
        .map_err(|e| e.at("/events"))?;

    let status = card_status(member.status, paid);
    let url = card_url(ctx.public_url(), &member.card_token);
    let page = views::members::card_page(&page_context(&ctx, Some(&current.session), &query), &member, status, &url);
    Ok(Html(page))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::testing::{body_text, location, Client},
        context::AppContext,
        db::models::Role,
        events::manager::tests::member_user,
        fees::manager::tests::{payment_form, year_form},
    };
    use axum::http::StatusCode;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_verify_page_shows_status() {
        let (ctx, _) = AppContext::for_tests().await;
        let user = member_user(&ctx.db, "Ada", "001").await;
        let member = ctx.members.get(user.member_id.unwrap()).await.unwrap();
        let anonymous = Client::new(&ctx, None).await;
        let uri = format!("/verify_member?token={}", member.card_token);

        let expired = body_text(anonymous.get(&ctx, &uri).await).await;
        assert!(expired.contains("Membership expired"));
        assert!(expired.contains("Ada"));

        let year = ctx.fees.create_social_year(&year_form("2030", 2030, true)).await.unwrap();
        ctx.fees
            .record_payment(&payment_form(member.id, year.id, NaiveDate::from_ymd_opt(2030, 2, 1).unwrap()))
            .await
            .unwrap();

        let active = body_text(anonymous.get(&ctx, &uri).await).await;
        assert!(active.contains("Valid membership"));
    }

    #[tokio::test]
    async fn test_unknown_token_reveals_nothing() {
        let (ctx, _) = AppContext::for_tests().await;
        let anonymous = Client::new(&ctx, None).await;

        let response = anonymous
            .get(&ctx, &format!("/verify_member?token={}", "a".repeat(64)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let unknown = body_text(response).await;

        let malformed = body_text(anonymous.get(&ctx, "/verify_member?token=nope").await).await;

        assert!(unknown.contains("Invalid card"));
        assert_eq!(unknown, malformed);
    }

    #[tokio::test]
    async fn test_card_requires_member_link() {
        let (ctx, _) = AppContext::for_tests().await;
        let admin = ctx
            .accounts
            .create_user("admin@example.org", "password123", Role::Admin, None)
            .await
            .unwrap();
        let client = Client::new(&ctx, Some(admin.id)).await;

        let response = client.get(&ctx, "/card").await;
        assert_eq!(location(&response), "/events?notice=not_a_member");
    }

    #[tokio::test]
    async fn test_card_shows_verification_link() {
        let (ctx, _) = AppContext::for_tests().await;
        let user = member_user(&ctx.db, "Ada", "001").await;
        let member = ctx.members.get(user.member_id.unwrap()).await.unwrap();
        let client = Client::new(&ctx, Some(user.id)).await;

        let page = body_text(client.get(&ctx, "/card").await).await;
        assert!(page.contains(&format!("/verify_member?token={}", member.card_token)));
    }
}
