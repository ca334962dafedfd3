use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "business_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessStatus {
    Pending,
    Active,
    Rejected,
    Banned,
    Suspended,
}

impl BusinessStatus {
    /// Banned and suspended businesses cannot sign in.
    pub fn can_sign_in(self) -> bool {
        !matches!(self, BusinessStatus::Banned | BusinessStatus::Suspended)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Business {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
    pub status: BusinessStatus,
    pub rejection_reason: Option<String>,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBusinessData {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBusinessProfile {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
}

/// Status change computed by the moderation workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessTransition {
    pub status: BusinessStatus,
    pub is_verified: Option<bool>,
    pub rejection_reason: Option<String>,
}

impl Business {
    /// Registers a new business; it starts out PENDING review
    pub async fn create(pool: &PgPool, data: CreateBusinessData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO businesses (email, password_hash, name, description, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.address)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM businesses WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM businesses WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lists businesses for the back-office, newest first
    pub async fn list(
        pool: &PgPool,
        status: Option<BusinessStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM businesses
            WHERE ($1::business_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateBusinessProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE businesses
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                address = COALESCE($4, address),
                latitude = COALESCE($5, latitude),
                longitude = COALESCE($6, longitude),
                logo_url = COALESCE($7, logo_url),
                cover_url = COALESCE($8, cover_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.address)
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(data.logo_url)
        .bind(data.cover_url)
        .fetch_optional(pool)
        .await
    }

    /// Applies a moderation transition in a single statement
    pub async fn apply_transition(
        pool: &PgPool,
        id: Uuid,
        transition: &BusinessTransition,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE businesses
            SET
                status = $2,
                is_verified = COALESCE($3, is_verified),
                rejection_reason = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(transition.status)
        .bind(transition.is_verified)
        .bind(&transition.rejection_reason)
        .fetch_optional(pool)
        .await
    }

    /// Approves every listed business in one statement. Returns the number
    /// of rows updated.
    pub async fn bulk_approve(pool: &PgPool, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE businesses
            SET status = 'ACTIVE', is_verified = TRUE, rejection_reason = NULL, updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Forgets the billing subscription after it was cancelled upstream
    pub async fn clear_subscription(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE businesses
            SET stripe_subscription_id = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(BusinessStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (BusinessStatus, i64)>(
            "SELECT status, COUNT(*) FROM businesses GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&BusinessStatus::Suspended).unwrap();
        assert_eq!(json, "\"SUSPENDED\"");

        let parsed: BusinessStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(parsed, BusinessStatus::Active);
    }

    #[test]
    fn test_sign_in_allowed_states() {
        assert!(BusinessStatus::Pending.can_sign_in());
        assert!(BusinessStatus::Rejected.can_sign_in());
        assert!(!BusinessStatus::Banned.can_sign_in());
        assert!(!BusinessStatus::Suspended.can_sign_in());
    }
}
