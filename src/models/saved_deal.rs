use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::deal::DealListing;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedDeal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub deal_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// What one toggle statement observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ToggleRow {
    pub removed: bool,
    pub inserted: bool,
}

impl SavedDeal {
    /// Flips the saved state for (user, deal) in a single statement.
    ///
    /// An existing row is deleted; otherwise a row is inserted. The insert
    /// is guarded by the (user_id, deal_id) unique key, so a concurrent
    /// toggle that already inserted leaves `inserted` false without error.
    pub async fn toggle(pool: &PgPool, user_id: Uuid, deal_id: Uuid) -> Result<ToggleRow, sqlx::Error> {
        sqlx::query_as::<_, ToggleRow>(
            r#"
            WITH removed AS (
                DELETE FROM saved_deals
                WHERE user_id = $1 AND deal_id = $2
                RETURNING id
            ),
            inserted AS (
                INSERT INTO saved_deals (user_id, deal_id)
                SELECT $1, $2
                WHERE NOT EXISTS (SELECT 1 FROM removed)
                ON CONFLICT (user_id, deal_id) DO NOTHING
                RETURNING id
            )
            SELECT
                EXISTS (SELECT 1 FROM removed) AS removed,
                EXISTS (SELECT 1 FROM inserted) AS inserted
            "#,
        )
        .bind(user_id)
        .bind(deal_id)
        .fetch_one(pool)
        .await
    }

    pub async fn exists(pool: &PgPool, user_id: Uuid, deal_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM saved_deals WHERE user_id = $1 AND deal_id = $2)",
        )
        .bind(user_id)
        .bind(deal_id)
        .fetch_one(pool)
        .await
    }

    /// Deals the user saved, most recently saved first
    pub async fn list_deals(pool: &PgPool, user_id: Uuid) -> Result<Vec<DealListing>, sqlx::Error> {
        sqlx::query_as::<_, DealListing>(
            r#"
            SELECT d.*, b.name AS business_name
            FROM saved_deals s
            JOIN deals d ON d.id = s.deal_id
            JOIN businesses b ON b.id = d.business_id
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
