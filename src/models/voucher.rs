use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};

use crate::models::deal::{Deal, DealCounter};
use uuid::Uuid;

use crate::models::ticket::TicketStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Voucher {
    pub id: Uuid,
    pub user_id: Uuid,
    pub deal_id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// A student's voucher together with its ticket and the deal it unlocks.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VoucherSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub voucher: Voucher,
    pub ticket_id: Option<Uuid>,
    pub ticket_status: Option<TicketStatus>,
    pub used_at: Option<DateTime<Utc>>,
    pub deal_title: String,
    pub discount_label: String,
    pub business_name: String,
}

impl Voucher {
    pub async fn find_by_pair<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM vouchers WHERE user_id = $1 AND deal_id = $2")
            .bind(user_id)
            .bind(deal_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM vouchers WHERE code = $1")
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// Inserts the voucher, its ISSUED ticket and bumps the deal's `claimed`
    /// counter in one transaction.
    ///
    /// Returns `None` without writing anything when a voucher for the
    /// (user, deal) pair already exists.
    pub async fn create_with_ticket(
        pool: &PgPool,
        user_id: Uuid,
        deal_id: Uuid,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let voucher = Self::insert_with_ticket(&mut *tx, user_id, deal_id, code).await?;
        if voucher.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        Ok(voucher)
    }

    /// Same writes as [`Voucher::create_with_ticket`] on a connection the
    /// caller already holds, typically inside its own transaction.
    pub async fn insert_with_ticket(
        conn: &mut PgConnection,
        user_id: Uuid,
        deal_id: Uuid,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let voucher = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO vouchers (user_id, deal_id, code)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, deal_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(deal_id)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(voucher) = voucher else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO tickets (voucher_id, deal_id, user_id, status)
            VALUES ($1, $2, $3, 'ISSUED')
            "#,
        )
        .bind(voucher.id)
        .bind(deal_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Deal::increment_counter(&mut *conn, deal_id, DealCounter::Claimed, 1).await?;

        Ok(Some(voucher))
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<VoucherSummary>, sqlx::Error> {
        sqlx::query_as::<_, VoucherSummary>(
            r#"
            SELECT
                v.*,
                t.id AS ticket_id,
                t.status AS ticket_status,
                t.used_at,
                d.title AS deal_title,
                d.discount_label,
                b.name AS business_name
            FROM vouchers v
            JOIN deals d ON d.id = v.deal_id
            JOIN businesses b ON b.id = d.business_id
            LEFT JOIN tickets t ON t.voucher_id = v.id
            WHERE v.user_id = $1
            ORDER BY v.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM vouchers")
            .fetch_one(pool)
            .await
    }
}
