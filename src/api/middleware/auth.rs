use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use super::session::{SESSION_KEY_ADMIN_ID, SESSION_KEY_BUSINESS_ID, SESSION_KEY_STUDENT_ID};
use crate::error::AppError;
use crate::models::{Business, User};

pub const ADMIN_LOGIN_PATH: &str = "/admin/login";

/// Every path under `/admin` except the login page needs an admin session.
pub fn is_admin_path(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    (path == "/admin" || path.starts_with("/admin/")) && path != ADMIN_LOGIN_PATH
}

/// Middleware that sends anonymous visitors of admin paths to the login page
pub async fn require_admin(session: Session, request: Request, next: Next) -> Response {
    if !is_admin_path(request.uri().path()) {
        return next.run(request).await;
    }

    match session.get::<Uuid>(SESSION_KEY_ADMIN_ID).await {
        Ok(Some(_)) => next.run(request).await,
        Ok(None) => {
            tracing::debug!(path = %request.uri().path(), "Anonymous admin request redirected");
            Redirect::to(ADMIN_LOGIN_PATH).into_response()
        }
        Err(e) => AppError::Session(e).into_response(),
    }
}

async fn signed_in(session: &Session, key: &str) -> Result<Uuid, AppError> {
    session
        .get::<Uuid>(key)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
}

pub async fn current_admin_id(session: &Session) -> Result<Uuid, AppError> {
    signed_in(session, SESSION_KEY_ADMIN_ID).await
}

pub async fn current_business_id(session: &Session) -> Result<Uuid, AppError> {
    signed_in(session, SESSION_KEY_BUSINESS_ID).await
}

pub async fn current_student_id(session: &Session) -> Result<Uuid, AppError> {
    signed_in(session, SESSION_KEY_STUDENT_ID).await
}

/// Loads the signed-in business. A business banned or suspended after
/// signing in loses access on its next request.
pub async fn current_business(session: &Session, pool: &PgPool) -> Result<Business, AppError> {
    let id = current_business_id(session).await?;
    let business = Business::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))?;

    if !business.status.can_sign_in() {
        return Err(AppError::Forbidden("This business account is not active".to_string()));
    }
    Ok(business)
}

/// Loads the signed-in student, refusing banned accounts.
pub async fn current_student(session: &Session, pool: &PgPool) -> Result<User, AppError> {
    let id = current_student_id(session).await?;
    let user = User::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))?;

    if user.is_banned {
        return Err(AppError::Forbidden("Account is banned".to_string()));
    }
    Ok(user)
}
