use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::session::AppState;
use crate::api::{success, ApiResult};
use crate::error::{is_foreign_key_violation, is_unique_violation, AppError};
use crate::models::category::CategoryData;
use crate::models::city::CityData;
use crate::models::university::{CampusData, UniversityData};
use crate::models::{Campus, Category, City, ListingStatus, University};

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ListingStatus,
}

fn required_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    Ok(())
}

/// Maps constraint violations on reference data to client errors.
fn constraint(what: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |err| {
        if is_unique_violation(&err) {
            AppError::Conflict(format!("{} with this name already exists", what))
        } else if is_foreign_key_violation(&err) {
            AppError::Conflict(format!("{} is referenced by other records", what))
        } else {
            err.into()
        }
    }
}

// Public listings

async fn active_categories(State(state): State<AppState>) -> ApiResult {
    let categories = Category::list(&state.pool, true).await?;
    Ok(success(json!({ "categories": categories })))
}

async fn active_universities(State(state): State<AppState>) -> ApiResult {
    let universities = University::list(&state.pool, true).await?;
    Ok(success(json!({ "universities": universities })))
}

async fn campuses(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let campuses = Campus::list_by_university(&state.pool, id).await?;
    Ok(success(json!({ "campuses": campuses })))
}

async fn cities(State(state): State<AppState>) -> ApiResult {
    let cities = City::list(&state.pool).await?;
    Ok(success(json!({ "cities": cities })))
}

// Admin: categories

async fn all_categories(State(state): State<AppState>) -> ApiResult {
    let categories = Category::list(&state.pool, false).await?;
    Ok(success(json!({ "categories": categories })))
}

async fn create_category(
    State(state): State<AppState>,
    Json(data): Json<CategoryData>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    required_name(&data.name)?;
    let category = Category::create(&state.pool, data)
        .await
        .map_err(constraint("Category"))?;

    tracing::info!(category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, success(json!({ "category": category }))))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<CategoryData>,
) -> ApiResult {
    required_name(&data.name)?;
    let category = Category::update(&state.pool, id, data)
        .await
        .map_err(constraint("Category"))?
        .ok_or_else(|| AppError::not_found("Category"))?;

    Ok(success(json!({ "category": category })))
}

async fn set_category_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult {
    let category = Category::set_status(&state.pool, id, change.status)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    Ok(success(json!({ "category": category })))
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    if !Category::delete(&state.pool, id)
        .await
        .map_err(constraint("Category"))?
    {
        return Err(AppError::not_found("Category"));
    }
    Ok(success(json!({})))
}

// Admin: universities and campuses

async fn all_universities(State(state): State<AppState>) -> ApiResult {
    let universities = University::list(&state.pool, false).await?;
    Ok(success(json!({ "universities": universities })))
}

async fn create_university(
    State(state): State<AppState>,
    Json(data): Json<UniversityData>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    required_name(&data.name)?;
    let university = University::create(&state.pool, data)
        .await
        .map_err(constraint("University"))?;

    tracing::info!(university_id = %university.id, "University created");
    Ok((StatusCode::CREATED, success(json!({ "university": university }))))
}

async fn update_university(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<UniversityData>,
) -> ApiResult {
    required_name(&data.name)?;
    let university = University::update(&state.pool, id, data)
        .await
        .map_err(constraint("University"))?
        .ok_or_else(|| AppError::not_found("University"))?;

    Ok(success(json!({ "university": university })))
}

async fn set_university_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult {
    let university = University::set_status(&state.pool, id, change.status)
        .await?
        .ok_or_else(|| AppError::not_found("University"))?;

    Ok(success(json!({ "university": university })))
}

async fn delete_university(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    if !University::delete(&state.pool, id)
        .await
        .map_err(constraint("University"))?
    {
        return Err(AppError::not_found("University"));
    }
    Ok(success(json!({})))
}

async fn create_campus(
    State(state): State<AppState>,
    Path(university_id): Path<Uuid>,
    Json(data): Json<CampusData>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    required_name(&data.name)?;
    University::find_by_id(&state.pool, university_id)
        .await?
        .ok_or_else(|| AppError::not_found("University"))?;

    let campus = Campus::create(&state.pool, university_id, data)
        .await
        .map_err(constraint("Campus"))?;

    Ok((StatusCode::CREATED, success(json!({ "campus": campus }))))
}

async fn create_city(
    State(state): State<AppState>,
    Json(data): Json<CityData>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    required_name(&data.name)?;
    let city = City::create(&state.pool, data)
        .await
        .map_err(constraint("City"))?;

    Ok((StatusCode::CREATED, success(json!({ "city": city }))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(active_categories))
        .route("/universities", get(active_universities))
        .route("/universities/:id/campuses", get(campuses))
        .route("/cities", get(cities))
        .route("/admin/categories", get(all_categories).post(create_category))
        .route(
            "/admin/categories/:id",
            put(update_category).delete(delete_category),
        )
        .route("/admin/categories/:id/status", put(set_category_status))
        .route(
            "/admin/universities",
            get(all_universities).post(create_university),
        )
        .route(
            "/admin/universities/:id",
            put(update_university).delete(delete_university),
        )
        .route("/admin/universities/:id/status", put(set_university_status))
        .route("/admin/universities/:id/campuses", post(create_campus))
        .route("/admin/cities", post(create_city))
}
