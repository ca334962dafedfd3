use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::auth::current_student;
use crate::api::middleware::session::AppState;
use crate::api::{success, ApiResult};
use crate::error::AppError;
use crate::models::user::UpdateUserProfile;
use crate::models::{User, Voucher};
use crate::services::accounts::normalize_email;
use crate::services::otp::{self, OtpRequest};
use crate::services::{engagement, qr, spin, voucher};

#[derive(Debug, Deserialize)]
pub struct OtpRequestBody {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyBody {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PushTokenBody {
    pub token: Option<String>,
}

async fn me(State(state): State<AppState>, session: Session) -> ApiResult {
    let user = current_student(&session, &state.pool).await?;
    Ok(success(json!({ "user": user })))
}

async fn update_me(
    State(state): State<AppState>,
    session: Session,
    Json(profile): Json<UpdateUserProfile>,
) -> ApiResult {
    if profile
        .full_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(AppError::validation("Full name cannot be empty"));
    }

    let user_id = current_student(&session, &state.pool).await?.id;
    let user = User::update_profile(&state.pool, user_id, profile)
        .await?
        .ok_or_else(|| AppError::not_found("Account"))?;

    Ok(success(json!({ "user": user })))
}

async fn set_push_token(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<PushTokenBody>,
) -> ApiResult {
    let user_id = current_student(&session, &state.pool).await?.id;
    let token = body
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    User::set_push_token(&state.pool, user_id, token).await?;
    Ok(success(json!({})))
}

async fn request_otp(State(state): State<AppState>, Json(body): Json<OtpRequestBody>) -> ApiResult {
    let email = normalize_email(&body.email)?;
    let outcome = otp::request_code(&state.pool, state.mailer.as_ref(), &state.config, &email).await?;

    Ok(success(json!({
        "sent": outcome == OtpRequest::Sent,
        "expires_in_minutes": otp::CODE_TTL_MINUTES,
    })))
}

async fn verify_otp(State(state): State<AppState>, Json(body): Json<OtpVerifyBody>) -> ApiResult {
    let email = normalize_email(&body.email)?;
    let code = body.code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("Verification code must be 6 digits"));
    }

    otp::verify_code(&state.pool, &state.config, &email, code).await?;
    Ok(success(json!({ "verified": true })))
}

async fn claim_deal(
    State(state): State<AppState>,
    session: Session,
    Path(deal_id): Path<Uuid>,
) -> ApiResult {
    let user = current_student(&session, &state.pool).await?;
    voucher::ensure_can_claim(&user)?;

    let claim = voucher::issue_or_retrieve(&state.pool, user.id, deal_id).await?;
    Ok(success(json!({
        "voucher": claim.voucher,
        "new": claim.newly_issued,
    })))
}

async fn my_vouchers(State(state): State<AppState>, session: Session) -> ApiResult {
    let user_id = current_student(&session, &state.pool).await?.id;
    let vouchers = Voucher::list_by_user(&state.pool, user_id).await?;
    Ok(success(json!({ "vouchers": vouchers })))
}

async fn voucher_qr(
    State(state): State<AppState>,
    session: Session,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let user_id = current_student(&session, &state.pool).await?.id;
    let voucher = Voucher::find_by_code(&state.pool, &code.trim().to_uppercase())
        .await?
        .filter(|v| v.user_id == user_id)
        .ok_or_else(|| AppError::not_found("Voucher"))?;

    let svg = qr::voucher_qr_svg(&voucher.code)?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

async fn toggle_saved(
    State(state): State<AppState>,
    session: Session,
    Path(deal_id): Path<Uuid>,
) -> ApiResult {
    let user_id = current_student(&session, &state.pool).await?.id;
    let outcome = engagement::toggle_save(&state.pool, user_id, deal_id).await?;

    Ok(success(json!({
        "saved": outcome.saved,
        "state": outcome.state,
    })))
}

async fn saved(State(state): State<AppState>, session: Session) -> ApiResult {
    let user_id = current_student(&session, &state.pool).await?.id;
    let deals = engagement::saved_deals(&state.pool, user_id).await?;
    Ok(success(json!({ "deals": deals })))
}

async fn spin_wheel(State(state): State<AppState>, session: Session) -> ApiResult {
    let user = current_student(&session, &state.pool).await?;
    let result = spin::spin(&state.pool, &user).await?;
    Ok(success(json!({ "spin": result })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/students/me", get(me).put(update_me))
        .route("/students/me/push-token", put(set_push_token))
        .route("/students/otp/request", post(request_otp))
        .route("/students/otp/verify", post(verify_otp))
        .route("/students/deals/:id/claim", post(claim_deal))
        .route("/students/deals/:id/save", post(toggle_saved))
        .route("/students/saved", get(saved))
        .route("/students/vouchers", get(my_vouchers))
        .route("/students/vouchers/:code/qr", get(voucher_qr))
        .route("/students/spin", post(spin_wheel))
}
