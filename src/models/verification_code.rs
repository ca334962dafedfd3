use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// An outstanding one-time code. Only the SHA-256 of the code is stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationCode {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Deletes any previous code for `email` and stores the new one
    pub async fn replace(
        pool: &PgPool,
        email: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM verification_codes WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let code = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO verification_codes (email, code_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(code)
    }

    /// Deletes and returns the code matching `email` and `code_hash`. Only one
    /// of several concurrent callers gets the row back.
    pub async fn consume(
        pool: &PgPool,
        email: &str,
        code_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            DELETE FROM verification_codes
            WHERE email = $1 AND code_hash = $2
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM verification_codes WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
