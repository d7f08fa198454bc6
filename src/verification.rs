/// Membership card verification
///
/// A card carries a QR code pointing at `/verify_member?token=...`. The token
/// resolves to a member and a live status computed from the membership
/// status and the fee payments of the current social year.
use crate::{
    crypto,
    db::models::{Member, MemberStatus},
    error::AppResult,
    metrics,
};
use sqlx::{FromRow, SqlitePool};

/// Card validity as shown to whoever scans the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    /// Active member with the current year paid
    Active,
    /// Active member, current year unpaid
    Expired,
    /// Unknown token or inactive member
    Invalid,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Expired => "expired",
            CardStatus::Invalid => "invalid",
        }
    }
}

/// Status for a resolved member
pub fn card_status(status: MemberStatus, paid_current_year: bool) -> CardStatus {
    match (status, paid_current_year) {
        (MemberStatus::Active, true) => CardStatus::Active,
        (MemberStatus::Active, false) => CardStatus::Expired,
        (MemberStatus::Inactive, _) => CardStatus::Invalid,
    }
}

/// Outcome of a verification. `member` is only set for active or expired
/// cards so an invalid card reveals nothing.
#[derive(Debug, Clone)]
pub struct CardVerification {
    pub status: CardStatus,
    pub member: Option<Member>,
}

impl CardVerification {
    fn invalid() -> Self {
        Self {
            status: CardStatus::Invalid,
            member: None,
        }
    }
}

#[derive(FromRow)]
struct CardRow {
    #[sqlx(flatten)]
    member: Member,
    paid_current_year: bool,
}

/// Read-only card verifier
pub struct CardVerifier {
    db: SqlitePool,
}

impl CardVerifier {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn verify(&self, token: &str) -> AppResult<CardVerification> {
        let verification = self.lookup(token).await?;
        metrics::CARD_VERIFICATIONS
            .with_label_values(&[verification.status.as_str()])
            .inc();
        Ok(verification)
    }

    async fn lookup(&self, token: &str) -> AppResult<CardVerification> {
        if !crypto::is_token_shaped(token) {
            return Ok(CardVerification::invalid());
        }

        let row = sqlx::query_as::<_, CardRow>(
            "SELECT m.id, m.name, m.email, m.membership_number, m.status, m.fiscal_code, m.photo_url,
                    m.card_token, m.created_at,
                    EXISTS (
                        SELECT 1 FROM membership_fee_payments p
                        JOIN social_years y ON y.id = p.social_year_id
                        WHERE p.member_id = m.id AND y.is_current = 1) AS paid_current_year
             FROM members m
             WHERE m.card_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(CardVerification::invalid());
        };

        match card_status(row.member.status, row.paid_current_year) {
            CardStatus::Invalid => Ok(CardVerification::invalid()),
            status => Ok(CardVerification {
                status,
                member: Some(row.member),
            }),
        }
    }
}

/// URL encoded in the card's QR code
pub fn card_url(public_url: &str, token: &str) -> String {
    format!(
        "{}/verify_member?token={}",
        public_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        fees::{
            manager::tests::{payment_form, year_form},
            FeeManager,
        },
        members::{manager::tests::new_member, MemberManager},
    };

    #[test]
    fn test_card_status_table() {
        assert_eq!(card_status(MemberStatus::Active, true), CardStatus::Active);
        assert_eq!(card_status(MemberStatus::Active, false), CardStatus::Expired);
        assert_eq!(card_status(MemberStatus::Inactive, true), CardStatus::Invalid);
        assert_eq!(card_status(MemberStatus::Inactive, false), CardStatus::Invalid);
    }

    #[test]
    fn test_card_url() {
        assert_eq!(
            card_url("https://soci.example.org/", "abc"),
            "https://soci.example.org/verify_member?token=abc"
        );
    }

    #[tokio::test]
    async fn test_removing_payment_expires_card() {
        let pool = db::test_pool().await;
        let members = MemberManager::new(pool.clone());
        let fees = FeeManager::new(pool.clone());
        let verifier = CardVerifier::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        let year = fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();
        let payment = fees
            .record_payment(&payment_form(anna.id, year.id, year.start_date))
            .await
            .unwrap();

        let result = verifier.verify(&anna.card_token).await.unwrap();
        assert_eq!(result.status, CardStatus::Active);
        assert_eq!(result.member.unwrap().name, "Anna");

        fees.delete_payment(payment.id).await.unwrap();

        let result = verifier.verify(&anna.card_token).await.unwrap();
        assert_eq!(result.status, CardStatus::Expired);
        assert!(members.get(anna.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_payment_for_past_year_is_expired() {
        let pool = db::test_pool().await;
        let members = MemberManager::new(pool.clone());
        let fees = FeeManager::new(pool.clone());
        let verifier = CardVerifier::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        let past = fees.create_social_year(&year_form("2024", 2024, false)).await.unwrap();
        fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();
        fees.record_payment(&payment_form(anna.id, past.id, past.start_date))
            .await
            .unwrap();

        assert_eq!(verifier.verify(&anna.card_token).await.unwrap().status, CardStatus::Expired);
    }

    #[tokio::test]
    async fn test_inactive_and_unknown_look_the_same() {
        let pool = db::test_pool().await;
        let members = MemberManager::new(pool.clone());
        let verifier = CardVerifier::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        members.set_status(anna.id, MemberStatus::Inactive).await.unwrap();

        let inactive = verifier.verify(&anna.card_token).await.unwrap();
        let unknown = verifier.verify(&crypto::generate_token()).await.unwrap();
        let malformed = verifier.verify("' OR 1=1 --").await.unwrap();

        for result in [inactive, unknown, malformed] {
            assert_eq!(result.status, CardStatus::Invalid);
            assert!(result.member.is_none());
        }
    }

    #[tokio::test]
    async fn test_rotated_token_stops_resolving() {
        let pool = db::test_pool().await;
        let members = MemberManager::new(pool.clone());
        let verifier = CardVerifier::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        let fresh = members.rotate_card_token(anna.id).await.unwrap();

        assert_eq!(verifier.verify(&anna.card_token).await.unwrap().status, CardStatus::Invalid);
        assert_eq!(verifier.verify(&fresh).await.unwrap().status, CardStatus::Expired);
    }
}
