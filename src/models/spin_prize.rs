use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Quantity value meaning "never runs out".
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "prize_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrizeType {
    Win,
    Lose,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SpinPrize {
    pub id: Uuid,
    pub deal_id: Option<Uuid>,
    pub name: String,
    pub prize_type: PrizeType,
    pub weight: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpinPrizeData {
    pub deal_id: Option<Uuid>,
    pub name: String,
    pub prize_type: PrizeType,
    pub weight: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SpinRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prize_id: Option<Uuid>,
    pub outcome: PrizeType,
    pub created_at: DateTime<Utc>,
}

impl SpinPrize {
    /// A prize takes part in draws while it has weight and stock left.
    pub fn is_drawable(&self) -> bool {
        self.weight > 0 && self.quantity != 0
    }

    pub fn has_finite_stock(&self) -> bool {
        self.quantity != UNLIMITED
    }

    pub async fn create(pool: &PgPool, data: SpinPrizeData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO spin_prizes (deal_id, name, prize_type, weight, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.deal_id)
        .bind(&data.name)
        .bind(data.prize_type)
        .bind(data.weight)
        .bind(data.quantity)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: SpinPrizeData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE spin_prizes
            SET deal_id = $2, name = $3, prize_type = $4, weight = $5, quantity = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.deal_id)
        .bind(&data.name)
        .bind(data.prize_type)
        .bind(data.weight)
        .bind(data.quantity)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM spin_prizes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM spin_prizes ORDER BY created_at")
            .fetch_all(pool)
            .await
    }

    pub async fn list_drawable(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM spin_prizes WHERE weight > 0 AND quantity <> 0 ORDER BY created_at",
        )
        .fetch_all(pool)
        .await
    }

    /// Takes one unit of finite stock. Returns false when the stock was
    /// already exhausted by a concurrent draw.
    pub async fn take_one<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE spin_prizes
            SET quantity = quantity - 1, updated_at = NOW()
            WHERE id = $1 AND quantity > 0
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl SpinRecord {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        prize_id: Option<Uuid>,
        outcome: PrizeType,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO spin_records (user_id, prize_id, outcome)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(prize_id)
        .bind(outcome)
        .fetch_one(executor)
        .await
    }

    pub async fn exists_since(
        pool: &PgPool,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM spin_records WHERE user_id = $1 AND created_at >= $2)",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }
}
