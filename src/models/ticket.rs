use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Issued,
    Redeemed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub deal_id: Uuid,
    pub user_id: Uuid,
    pub status: TicketStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket with its voucher code and the business that owns the deal.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: Ticket,
    pub code: String,
    pub deal_title: String,
    pub business_id: Uuid,
}

const DETAILS_SELECT: &str = r#"
    SELECT t.*, v.code, d.title AS deal_title, d.business_id
    FROM tickets t
    JOIN vouchers v ON v.id = t.voucher_id
    JOIN deals d ON d.id = t.deal_id
"#;

impl Ticket {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_details(pool: &PgPool, id: Uuid) -> Result<Option<TicketDetails>, sqlx::Error> {
        let query = format!("{} WHERE t.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, TicketDetails>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_details_by_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Option<TicketDetails>, sqlx::Error> {
        let query = format!("{} WHERE v.code = $1", DETAILS_SELECT);
        sqlx::query_as::<_, TicketDetails>(&query)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// Marks the ticket REDEEMED unless it already is. `None` means either the
    /// ticket does not exist or it was redeemed before.
    pub async fn redeem_unless_redeemed(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tickets
            SET status = 'REDEEMED', used_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status <> 'REDEEMED'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Voids the ticket regardless of its current status
    pub async fn void(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE tickets
            SET status = 'EXPIRED', used_at = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Expires every still-issued ticket whose deal has ended
    pub async fn expire_for_ended_deals(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets t
            SET status = 'EXPIRED', updated_at = NOW()
            FROM deals d
            WHERE d.id = t.deal_id
              AND t.status = 'ISSUED'
              AND d.expires_at IS NOT NULL
              AND d.expires_at <= NOW()
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Ticket counts per status, optionally limited to one business's deals
    pub async fn count_by_status(
        pool: &PgPool,
        business_id: Option<Uuid>,
    ) -> Result<Vec<(TicketStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (TicketStatus, i64)>(
            r#"
            SELECT t.status, COUNT(*)
            FROM tickets t
            JOIN deals d ON d.id = t.deal_id
            WHERE ($1::uuid IS NULL OR d.business_id = $1)
            GROUP BY t.status
            ORDER BY t.status
            "#,
        )
        .bind(business_id)
        .fetch_all(pool)
        .await
    }
}
