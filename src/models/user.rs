use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A student account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub university_id: Option<Uuid>,
    pub campus_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub is_verified: bool,
    pub is_banned: bool,
    #[serde(skip_serializing)]
    pub push_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserData {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub university_id: Option<Uuid>,
    pub campus_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserProfile {
    pub full_name: Option<String>,
    pub university_id: Option<Uuid>,
    pub campus_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, FromRow)]
pub struct UserCounts {
    pub total: i64,
    pub verified: i64,
    pub banned: i64,
}

impl User {
    pub async fn create(pool: &PgPool, data: CreateUserData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (email, password_hash, full_name, university_id, campus_id, city_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.full_name)
        .bind(data.university_id)
        .bind(data.campus_id)
        .bind(data.city_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL OR email ILIKE '%' || $1 || '%'
                   OR full_name ILIKE '%' || $1 || '%')
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUserProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE users
            SET
                full_name = COALESCE($2, full_name),
                university_id = COALESCE($3, university_id),
                campus_id = COALESCE($4, campus_id),
                city_id = COALESCE($5, city_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.full_name)
        .bind(data.university_id)
        .bind(data.campus_id)
        .bind(data.city_id)
        .fetch_optional(pool)
        .await
    }

    /// Marks the account owning `email` verified. Returns false when no
    /// account uses that address.
    pub async fn mark_verified(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE email = $1",
        )
        .bind(email)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_banned(
        pool: &PgPool,
        id: Uuid,
        is_banned: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE users
            SET is_banned = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_banned)
        .fetch_optional(pool)
        .await
    }

    /// Stores the device token used for push notifications
    pub async fn set_push_token(
        pool: &PgPool,
        id: Uuid,
        push_token: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET push_token = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(push_token)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn counts(pool: &PgPool) -> Result<UserCounts, sqlx::Error> {
        sqlx::query_as::<_, UserCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE is_verified) AS verified,
                COUNT(*) FILTER (WHERE is_banned) AS banned
            FROM users
            "#,
        )
        .fetch_one(pool)
        .await
    }
}
