use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::category::ListingStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct University {
    pub id: Uuid,
    pub city_id: Option<Uuid>,
    pub name: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniversityData {
    pub city_id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campus {
    pub id: Uuid,
    pub university_id: Uuid,
    pub city_id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampusData {
    pub city_id: Option<Uuid>,
    pub name: String,
}

impl University {
    pub async fn create(pool: &PgPool, data: UniversityData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO universities (city_id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(data.city_id)
        .bind(&data.name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM universities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UniversityData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE universities
            SET city_id = $2, name = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.city_id)
        .bind(&data.name)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: ListingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE universities
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM universities WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &PgPool, active_only: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM universities
            WHERE NOT $1 OR status = 'ACTIVE'
            ORDER BY name
            "#,
        )
        .bind(active_only)
        .fetch_all(pool)
        .await
    }
}

impl Campus {
    pub async fn create(
        pool: &PgPool,
        university_id: Uuid,
        data: CampusData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO campuses (university_id, city_id, name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(university_id)
        .bind(data.city_id)
        .bind(&data.name)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_university(
        pool: &PgPool,
        university_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM campuses WHERE university_id = $1 ORDER BY name")
            .bind(university_id)
            .fetch_all(pool)
            .await
    }
}
