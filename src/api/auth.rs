use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_sessions::Session;

use crate::api::middleware::session::{
    AppState, SESSION_KEY_ADMIN_ID, SESSION_KEY_BUSINESS_ID, SESSION_KEY_STUDENT_ID,
};
use crate::api::{success, ApiResult};
use crate::services::accounts::{self, BusinessRegistration, Credentials, StudentRegistration};

/// Landing page of the admin guard.
async fn admin_login_page() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Admin sign-in required" })),
    )
        .into_response()
}

async fn admin_login(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> ApiResult {
    let admin = accounts::authenticate_admin(&state.pool, &state.passwords, &credentials).await?;

    session.cycle_id().await?;
    session.insert(SESSION_KEY_ADMIN_ID, admin.id).await?;

    Ok(success(json!({ "admin": admin })))
}

async fn admin_logout(session: Session) -> ApiResult {
    session.remove::<uuid::Uuid>(SESSION_KEY_ADMIN_ID).await?;
    Ok(success(json!({})))
}

async fn business_register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<BusinessRegistration>,
) -> Result<(StatusCode, Json<serde_json::Value>), crate::error::AppError> {
    let business = accounts::register_business(&state.pool, &state.passwords, registration).await?;

    session.cycle_id().await?;
    session.insert(SESSION_KEY_BUSINESS_ID, business.id).await?;

    Ok((StatusCode::CREATED, success(json!({ "business": business }))))
}

async fn business_login(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> ApiResult {
    let business =
        accounts::authenticate_business(&state.pool, &state.passwords, &credentials).await?;

    session.cycle_id().await?;
    session.insert(SESSION_KEY_BUSINESS_ID, business.id).await?;

    Ok(success(json!({ "business": business })))
}

async fn business_logout(session: Session) -> ApiResult {
    session.remove::<uuid::Uuid>(SESSION_KEY_BUSINESS_ID).await?;
    Ok(success(json!({})))
}

async fn student_register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<StudentRegistration>,
) -> Result<(StatusCode, Json<serde_json::Value>), crate::error::AppError> {
    let user = accounts::register_student(&state.pool, &state.passwords, registration).await?;

    session.cycle_id().await?;
    session.insert(SESSION_KEY_STUDENT_ID, user.id).await?;

    Ok((StatusCode::CREATED, success(json!({ "user": user }))))
}

async fn student_login(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> ApiResult {
    let user = accounts::authenticate_student(&state.pool, &state.passwords, &credentials).await?;

    session.cycle_id().await?;
    session.insert(SESSION_KEY_STUDENT_ID, user.id).await?;

    Ok(success(json!({ "user": user })))
}

async fn student_logout(session: Session) -> ApiResult {
    session.remove::<uuid::Uuid>(SESSION_KEY_STUDENT_ID).await?;
    Ok(success(json!({})))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", get(admin_login_page).post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/business/register", post(business_register))
        .route("/business/login", post(business_login))
        .route("/business/logout", post(business_logout))
        .route("/students/register", post(student_register))
        .route("/students/login", post(student_login))
        .route("/students/logout", post(student_logout))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::testing::{body_json, empty_request, json_request, send, test_app};

    #[tokio::test]
    async fn test_admin_login_page_is_reachable_anonymously() {
        let app = test_app();
        let (status, body) = body_json(send(&app, empty_request("GET", "/admin/login")).await).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Admin sign-in required");
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_database() {
        let app = test_app();
        let request = json_request(
            "POST",
            "/students/register",
            json!({
                "email": "student@uni.edu",
                "password": "short",
                "full_name": "Student"
            }),
        );
        let (status, body) = body_json(send(&app, request).await).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password must be at least 8 characters");
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let app = test_app();
        let request = json_request(
            "POST",
            "/business/register",
            json!({
                "email": "not-an-email",
                "password": "long enough",
                "name": "Shop"
            }),
        );
        let (status, _) = body_json(send(&app, request).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_database_failure_is_generic_500() {
        let app = test_app();
        let request = json_request(
            "POST",
            "/students/login",
            json!({ "email": "student@uni.edu", "password": "whatever1" }),
        );
        let (status, body) = body_json(send(&app, request).await).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }
}
