use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::auth::current_business;
use crate::api::middleware::session::AppState;
use crate::api::{success, ApiResult};
use crate::error::AppError;
use crate::models::business::UpdateBusinessProfile;
use crate::models::deal::{CreateDealData, UpdateDealData};
use crate::models::location::CreateLocationData;
use crate::models::{Business, BusinessLocation, Deal};
use crate::services::{redemption, reporting};

#[derive(Debug, Deserialize)]
pub struct TicketLookup {
    pub code: String,
}

fn validate_new_deal(data: &CreateDealData) -> Result<(), AppError> {
    if data.title.trim().is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    if data.discount_label.trim().is_empty() {
        return Err(AppError::validation("Discount label is required"));
    }
    if data.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(AppError::validation("Expiry must be in the future"));
    }
    Ok(())
}

fn validate_deal_update(data: &UpdateDealData) -> Result<(), AppError> {
    if data.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::validation("Title cannot be empty"));
    }
    if data
        .discount_label
        .as_deref()
        .is_some_and(|l| l.trim().is_empty())
    {
        return Err(AppError::validation("Discount label cannot be empty"));
    }
    if data.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(AppError::validation("Expiry must be in the future"));
    }
    Ok(())
}

async fn profile(State(state): State<AppState>, session: Session) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    Ok(success(json!({ "business": business })))
}

async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    Json(profile): Json<UpdateBusinessProfile>,
) -> ApiResult {
    if profile.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Business name cannot be empty"));
    }

    let business = current_business(&session, &state.pool).await?;
    let business = Business::update_profile(&state.pool, business.id, profile)
        .await?
        .ok_or_else(|| AppError::not_found("Business"))?;

    Ok(success(json!({ "business": business })))
}

async fn my_deals(State(state): State<AppState>, session: Session) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    let deals = Deal::list_by_business(&state.pool, business.id).await?;
    Ok(success(json!({ "deals": deals })))
}

async fn create_deal(
    State(state): State<AppState>,
    session: Session,
    Json(data): Json<CreateDealData>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    validate_new_deal(&data)?;

    let business = current_business(&session, &state.pool).await?;
    let deal = Deal::create(&state.pool, business.id, data).await?;

    tracing::info!(deal_id = %deal.id, business_id = %business.id, "Deal submitted for review");
    Ok((StatusCode::CREATED, success(json!({ "deal": deal }))))
}

async fn update_deal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateDealData>,
) -> ApiResult {
    validate_deal_update(&data)?;

    let business = current_business(&session, &state.pool).await?;
    let deal = Deal::update_owned(&state.pool, id, business.id, data)
        .await?
        .ok_or_else(|| AppError::not_found("Deal"))?;

    tracing::info!(deal_id = %deal.id, "Deal edited, back in review");
    Ok(success(json!({ "deal": deal })))
}

async fn delete_deal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    if !Deal::delete_owned(&state.pool, id, business.id).await? {
        return Err(AppError::not_found("Deal"));
    }
    Ok(success(json!({})))
}

async fn locations(State(state): State<AppState>, session: Session) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    let locations = BusinessLocation::list_by_business(&state.pool, business.id).await?;
    Ok(success(json!({ "locations": locations })))
}

async fn add_location(
    State(state): State<AppState>,
    session: Session,
    Json(data): Json<CreateLocationData>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if data.label.trim().is_empty() || data.address.trim().is_empty() {
        return Err(AppError::validation("Label and address are required"));
    }

    let business = current_business(&session, &state.pool).await?;
    let location = BusinessLocation::create(&state.pool, business.id, data).await?;
    Ok((StatusCode::CREATED, success(json!({ "location": location }))))
}

async fn remove_location(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    if !BusinessLocation::delete_owned(&state.pool, id, business.id).await? {
        return Err(AppError::not_found("Location"));
    }
    Ok(success(json!({})))
}

async fn lookup_ticket(
    State(state): State<AppState>,
    session: Session,
    Query(lookup): Query<TicketLookup>,
) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    let ticket = redemption::owned_ticket_by_code(&state.pool, business.id, &lookup.code).await?;
    Ok(success(json!({ "ticket": ticket })))
}

async fn redeem_ticket(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    let ticket = redemption::redeem_for_business(&state.pool, business.id, id).await?;
    Ok(success(json!({ "ticket": ticket })))
}

async fn void_ticket(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    let ticket = redemption::void_for_business(&state.pool, business.id, id).await?;
    Ok(success(json!({ "ticket": ticket })))
}

async fn analytics(State(state): State<AppState>, session: Session) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;
    let analytics = reporting::business_analytics(&state.pool, business.id).await?;
    Ok(success(json!({ "analytics": analytics })))
}

async fn cancel_subscription(State(state): State<AppState>, session: Session) -> ApiResult {
    let business = current_business(&session, &state.pool).await?;

    let subscription_id = business
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| AppError::not_found("Subscription"))?;

    let billing = state.billing.as_ref().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Billing provider is not configured"))
    })?;

    let canceled = billing.cancel_subscription(subscription_id).await?;
    Business::clear_subscription(&state.pool, business.id).await?;

    tracing::info!(business_id = %business.id, "Subscription canceled");
    Ok(success(json!({ "subscription": { "id": canceled.id, "status": canceled.status } })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/business/me", get(profile).put(update_profile))
        .route("/business/deals", get(my_deals).post(create_deal))
        .route("/business/deals/:id", put(update_deal).delete(delete_deal))
        .route("/business/locations", get(locations).post(add_location))
        .route("/business/locations/:id", delete(remove_location))
        .route("/business/tickets/lookup", get(lookup_ticket))
        .route("/business/tickets/:id/redeem", post(redeem_ticket))
        .route("/business/tickets/:id/void", post(void_ticket))
        .route("/business/analytics", get(analytics))
        .route("/business/subscription/cancel", post(cancel_subscription))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::api::testing::{body_json, empty_request, json_request, send, test_app};

    fn new_deal(title: &str, label: &str) -> CreateDealData {
        CreateDealData {
            category_id: None,
            title: title.to_string(),
            description: None,
            discount_label: label.to_string(),
            image_url: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_new_deal_validation() {
        assert!(validate_new_deal(&new_deal("Free fries", "100%")).is_ok());
        assert!(validate_new_deal(&new_deal(" ", "100%")).is_err());
        assert!(validate_new_deal(&new_deal("Free fries", "")).is_err());

        let mut expired = new_deal("Free fries", "100%");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(validate_new_deal(&expired).is_err());
    }

    #[test]
    fn test_deal_update_validation() {
        assert!(validate_deal_update(&UpdateDealData::default()).is_ok());

        let blank_title = UpdateDealData {
            title: Some("".to_string()),
            ..Default::default()
        };
        assert!(validate_deal_update(&blank_title).is_err());
    }

    #[tokio::test]
    async fn test_invalid_deal_rejected_before_session_lookup() {
        let app = test_app();
        let request = json_request(
            "POST",
            "/business/deals",
            json!({ "title": "", "discount_label": "10%" }),
        );
        let (status, body) = body_json(send(&app, request).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");
    }

    #[tokio::test]
    async fn test_redeem_requires_business_session() {
        let app = test_app();
        let uri = format!("/business/tickets/{}/redeem", Uuid::new_v4());
        let (status, _) = body_json(send(&app, empty_request("POST", &uri)).await).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
