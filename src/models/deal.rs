use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "deal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    Pending,
    Approved,
    Active,
    Rejected,
}

/// Monotonic engagement counters kept on each deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealCounter {
    Views,
    Clicks,
    Claimed,
}

impl DealCounter {
    fn column(self) -> &'static str {
        match self {
            DealCounter::Views => "views",
            DealCounter::Clicks => "clicks",
            DealCounter::Claimed => "claimed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deal {
    pub id: Uuid,
    pub business_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub discount_label: String,
    pub image_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: DealStatus,
    pub rejection_reason: Option<String>,
    pub priority_score: i32,
    pub views: i64,
    pub clicks: i64,
    pub claimed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A deal joined with the name of the business offering it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DealListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub deal: Deal,
    pub business_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDealData {
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub discount_label: String,
    pub image_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDealData {
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub discount_label: Option<String>,
    pub image_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub category_id: Option<Uuid>,
    pub business_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Status change computed by the moderation workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct DealTransition {
    pub status: DealStatus,
    pub rejection_reason: Option<String>,
    pub priority_score: Option<i32>,
}

const LIVE_CONDITION: &str =
    "d.status IN ('APPROVED', 'ACTIVE') AND (d.expires_at IS NULL OR d.expires_at > NOW())";

impl Deal {
    /// Creates a deal awaiting review
    pub async fn create(
        pool: &PgPool,
        business_id: Uuid,
        data: CreateDealData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO deals (
                business_id, category_id, title, description,
                discount_label, image_url, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(data.category_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.discount_label)
        .bind(&data.image_url)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM deals WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a deal only if it is currently live
    pub async fn find_live<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<DealListing>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT d.*, b.name AS business_name
            FROM deals d
            JOIN businesses b ON b.id = d.business_id
            WHERE d.id = $1 AND b.status = 'ACTIVE' AND {}
            "#,
            LIVE_CONDITION
        );

        sqlx::query_as::<_, DealListing>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists live deals, highest priority first
    pub async fn list_live(pool: &PgPool, filter: &DealFilter) -> Result<Vec<DealListing>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT d.*, b.name AS business_name
            FROM deals d
            JOIN businesses b ON b.id = d.business_id
            WHERE b.status = 'ACTIVE'
              AND {}
              AND ($1::uuid IS NULL OR d.category_id = $1)
              AND ($2::uuid IS NULL OR d.business_id = $2)
              AND ($3::text IS NULL OR d.title ILIKE '%' || $3 || '%'
                   OR d.description ILIKE '%' || $3 || '%')
            ORDER BY d.priority_score DESC, d.created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            LIVE_CONDITION
        );

        sqlx::query_as::<_, DealListing>(&query)
            .bind(filter.category_id)
            .bind(filter.business_id)
            .bind(&filter.search)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_business(pool: &PgPool, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM deals
            WHERE business_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(business_id)
        .fetch_all(pool)
        .await
    }

    /// Back-office listing, optionally restricted to one status
    pub async fn list_for_review(
        pool: &PgPool,
        status: Option<DealStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DealListing>, sqlx::Error> {
        sqlx::query_as::<_, DealListing>(
            r#"
            SELECT d.*, b.name AS business_name
            FROM deals d
            JOIN businesses b ON b.id = d.business_id
            WHERE ($1::deal_status IS NULL OR d.status = $1)
            ORDER BY d.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Edits a deal owned by `business_id`. Any edit sends the deal back to
    /// review, so the status returns to PENDING and the reason is cleared.
    pub async fn update_owned(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        data: UpdateDealData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE deals
            SET
                category_id = COALESCE($3, category_id),
                title = COALESCE($4, title),
                description = COALESCE($5, description),
                discount_label = COALESCE($6, discount_label),
                image_url = COALESCE($7, image_url),
                expires_at = COALESCE($8, expires_at),
                status = 'PENDING',
                rejection_reason = NULL,
                updated_at = NOW()
            WHERE id = $1 AND business_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(business_id)
        .bind(data.category_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.discount_label)
        .bind(data.image_url)
        .bind(data.expires_at)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_owned(pool: &PgPool, id: Uuid, business_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM deals WHERE id = $1 AND business_id = $2")
            .bind(id)
            .bind(business_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM deals WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a moderation transition in a single statement
    pub async fn apply_transition(
        pool: &PgPool,
        id: Uuid,
        transition: &DealTransition,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE deals
            SET
                status = $2,
                rejection_reason = $3,
                priority_score = COALESCE($4, priority_score),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(transition.status)
        .bind(&transition.rejection_reason)
        .bind(transition.priority_score)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_priority(
        pool: &PgPool,
        id: Uuid,
        priority_score: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE deals
            SET priority_score = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(priority_score)
        .fetch_optional(pool)
        .await
    }

    /// Atomically adds `by` to a counter. Returns false if the deal is gone.
    pub async fn increment_counter<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        counter: DealCounter,
        by: u32,
    ) -> Result<bool, sqlx::Error> {
        let column = counter.column();
        let query = format!(
            "UPDATE deals SET {column} = {column} + $2 WHERE id = $1",
            column = column
        );

        let result = sqlx::query(&query)
            .bind(id)
            .bind(i64::from(by))
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(DealStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (DealStatus, i64)>(
            "SELECT status, COUNT(*) FROM deals GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(status: DealStatus, expires_at: Option<DateTime<Utc>>) -> Deal {
        let now = Utc::now();
        Deal {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            category_id: None,
            title: "2-for-1 burritos".to_string(),
            description: None,
            discount_label: "50%".to_string(),
            image_url: None,
            expires_at,
            status,
            rejection_reason: None,
            priority_score: 0,
            views: 0,
            clicks: 0,
            claimed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_counter_columns() {
        assert_eq!(DealCounter::Views.column(), "views");
        assert_eq!(DealCounter::Clicks.column(), "clicks");
        assert_eq!(DealCounter::Claimed.column(), "claimed");
    }

    #[test]
    fn test_listing_flattens_deal() {
        let listing = DealListing {
            deal: deal(DealStatus::Approved, None),
            business_name: "Taco Shack".to_string(),
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["business_name"], "Taco Shack");
        assert_eq!(json["status"], "APPROVED");
        assert_eq!(json["title"], "2-for-1 burritos");
    }
}
