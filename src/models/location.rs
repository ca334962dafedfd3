use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessLocation {
    pub id: Uuid,
    pub business_id: Uuid,
    pub city_id: Option<Uuid>,
    pub label: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocationData {
    pub city_id: Option<Uuid>,
    pub label: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl BusinessLocation {
    pub async fn create(
        pool: &PgPool,
        business_id: Uuid,
        data: CreateLocationData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO business_locations (business_id, city_id, label, address, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(data.city_id)
        .bind(&data.label)
        .bind(&data.address)
        .bind(data.latitude)
        .bind(data.longitude)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_business(pool: &PgPool, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM business_locations WHERE business_id = $1 ORDER BY created_at",
        )
        .bind(business_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_owned(pool: &PgPool, id: Uuid, business_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM business_locations WHERE id = $1 AND business_id = $2")
            .bind(id)
            .bind(business_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
