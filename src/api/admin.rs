use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::middleware::session::AppState;
use crate::api::{success, ApiResult, Pagination};
use crate::error::{is_foreign_key_violation, AppError};
use crate::models::spin_prize::{SpinPrizeData, UNLIMITED};
use crate::models::{Business, BusinessStatus, Deal, DealStatus, SpinPrize, User};
use crate::services::moderation::{self, ModerationAction, Outcome};
use crate::services::redemption;

#[derive(Debug, Deserialize)]
pub struct BusinessQuery {
    pub status: Option<BusinessStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DealReviewQuery {
    pub status: Option<DealStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub action: ModerationAction,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkApproveRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub priority_score: i32,
}

fn page(limit: Option<i64>, offset: Option<i64>) -> Pagination {
    Pagination { limit, offset }
}

fn outcome_body<T: serde::Serialize>(key: &str, outcome: Outcome<T>) -> Value {
    match outcome {
        Outcome::Updated(record) => json!({ key: record }),
        Outcome::Deleted => json!({ "deleted": true }),
    }
}

fn validate_prize(data: &SpinPrizeData) -> Result<(), AppError> {
    if data.name.trim().is_empty() {
        return Err(AppError::validation("Prize name is required"));
    }
    if data.weight < 0 {
        return Err(AppError::validation("Weight cannot be negative"));
    }
    if data.quantity < UNLIMITED {
        return Err(AppError::validation(
            "Quantity must be -1 (unlimited) or a non-negative stock",
        ));
    }
    Ok(())
}

fn unknown_deal(err: sqlx::Error) -> AppError {
    if is_foreign_key_violation(&err) {
        AppError::not_found("Deal")
    } else {
        err.into()
    }
}

// Businesses

async fn list_businesses(
    State(state): State<AppState>,
    Query(query): Query<BusinessQuery>,
) -> ApiResult {
    let page = page(query.limit, query.offset);
    let businesses =
        Business::list(&state.pool, query.status, page.limit(), page.offset()).await?;

    Ok(success(json!({
        "businesses": businesses,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

async fn moderate_business(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ModerationRequest>,
) -> ApiResult {
    let outcome =
        moderation::moderate_business(&state.pool, id, request.action, request.reason.as_deref())
            .await?;
    Ok(success(outcome_body("business", outcome)))
}

async fn bulk_approve(
    State(state): State<AppState>,
    Json(request): Json<BulkApproveRequest>,
) -> ApiResult {
    let approved = moderation::bulk_approve_businesses(&state.pool, &request.ids).await?;
    Ok(success(json!({ "approved": approved })))
}

// Deals

async fn review_deals(
    State(state): State<AppState>,
    Query(query): Query<DealReviewQuery>,
) -> ApiResult {
    let page = page(query.limit, query.offset);
    let deals =
        Deal::list_for_review(&state.pool, query.status, page.limit(), page.offset()).await?;

    Ok(success(json!({
        "deals": deals,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

async fn moderate_deal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ModerationRequest>,
) -> ApiResult {
    let outcome =
        moderation::moderate_deal(&state.pool, id, request.action, request.reason.as_deref())
            .await?;
    Ok(success(outcome_body("deal", outcome)))
}

async fn set_priority(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PriorityRequest>,
) -> ApiResult {
    let score = moderation::validate_priority(request.priority_score)?;
    let deal = Deal::set_priority(&state.pool, id, score)
        .await?
        .ok_or_else(|| AppError::not_found("Deal"))?;

    Ok(success(json!({ "deal": deal })))
}

// Users and tickets

async fn list_users(State(state): State<AppState>, Query(query): Query<UserQuery>) -> ApiResult {
    let page = page(query.limit, query.offset);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let users = User::list(&state.pool, search, page.limit(), page.offset()).await?;

    Ok(success(json!({
        "users": users,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

async fn set_banned(state: &AppState, id: Uuid, banned: bool) -> ApiResult {
    let user = User::set_banned(&state.pool, id, banned)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    tracing::info!(user_id = %id, banned, "User ban flag changed");
    Ok(success(json!({ "user": user })))
}

async fn ban_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    set_banned(&state, id, true).await
}

async fn unban_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    set_banned(&state, id, false).await
}

async fn void_ticket(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let ticket = redemption::void(&state.pool, id).await?;
    Ok(success(json!({ "ticket": ticket })))
}

// Spin prizes

async fn list_prizes(State(state): State<AppState>) -> ApiResult {
    let prizes = SpinPrize::list(&state.pool).await?;
    Ok(success(json!({ "prizes": prizes })))
}

async fn create_prize(
    State(state): State<AppState>,
    Json(data): Json<SpinPrizeData>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    validate_prize(&data)?;
    let prize = SpinPrize::create(&state.pool, data)
        .await
        .map_err(unknown_deal)?;

    tracing::info!(prize_id = %prize.id, "Spin prize created");
    Ok((StatusCode::CREATED, success(json!({ "prize": prize }))))
}

async fn update_prize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<SpinPrizeData>,
) -> ApiResult {
    validate_prize(&data)?;
    let prize = SpinPrize::update(&state.pool, id, data)
        .await
        .map_err(unknown_deal)?
        .ok_or_else(|| AppError::not_found("Prize"))?;

    Ok(success(json!({ "prize": prize })))
}

async fn delete_prize(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    if !SpinPrize::delete(&state.pool, id).await? {
        return Err(AppError::not_found("Prize"));
    }
    Ok(success(json!({})))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/businesses", get(list_businesses))
        .route("/admin/businesses/bulk-approve", post(bulk_approve))
        .route("/admin/businesses/:id/moderate", post(moderate_business))
        .route("/admin/deals", get(review_deals))
        .route("/admin/deals/:id/moderate", post(moderate_deal))
        .route("/admin/deals/:id/priority", put(set_priority))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/ban", post(ban_user))
        .route("/admin/users/:id/unban", post(unban_user))
        .route("/admin/tickets/:id/void", post(void_ticket))
        .route("/admin/spin-prizes", get(list_prizes).post(create_prize))
        .route(
            "/admin/spin-prizes/:id",
            put(update_prize).delete(delete_prize),
        )
}
