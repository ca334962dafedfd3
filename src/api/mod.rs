// API module - HTTP endpoints

pub mod admin;
pub mod auth;
pub mod business;
pub mod deals;
pub mod health;
pub mod middleware;
pub mod reference;
pub mod reports;
pub mod students;

use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use middleware::session::AppState;

pub type ApiResult = Result<Json<Value>, AppError>;

/// Wraps a payload in the success envelope: `{"success": true, ...payload}`.
/// Objects are merged, anything else lands under `data`.
pub fn success(payload: Value) -> Json<Value> {
    let mut body = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    body.insert("success".to_string(), Value::Bool(true));
    Json(Value::Object(body))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(deals::router())
        .merge(reference::router())
        .merge(students::router())
        .merge(business::router())
        .merge(admin::router())
        .merge(reports::router())
}

/// All routes behind the admin guard. The session layer is added by the
/// caller.
pub fn app(state: AppState) -> Router {
    with_guard(router(), state)
}

fn with_guard(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::body::{to_bytes, Body};
    use axum::extract::Path;
    use axum::http::{header, Request, Response, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;
    use tower_sessions::Session;
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::middleware::session::{
        memory_session_layer, test_state, AppState, SESSION_KEY_ADMIN_ID, SESSION_KEY_STUDENT_ID,
    };

    pub const TEST_ADMIN_SIGN_IN: &str = "/test/admin-session";

    /// The full app over an unreachable database and in-memory sessions,
    /// plus routes that sign the caller in as an admin or a given student.
    pub fn test_app() -> Router {
        build(test_state())
    }

    /// Same as [`test_app`] over a real database.
    pub fn test_app_with_pool(pool: PgPool) -> Router {
        build(AppState {
            pool,
            ..test_state()
        })
    }

    fn build(state: AppState) -> Router {
        let routes = super::router()
            .route(
                TEST_ADMIN_SIGN_IN,
                post(|session: Session| async move {
                    session
                        .insert(SESSION_KEY_ADMIN_ID, Uuid::new_v4())
                        .await
                        .unwrap();
                }),
            )
            .route(
                "/test/student-session/:id",
                post(|session: Session, Path(id): Path<Uuid>| async move {
                    session.insert(SESSION_KEY_STUDENT_ID, id).await.unwrap();
                }),
            );
        super::with_guard(routes, state).layer(memory_session_layer())
    }

    /// Signs in as the given student and returns the session cookie.
    pub async fn student_cookie(app: &Router, student_id: Uuid) -> String {
        let uri = format!("/test/student-session/{}", student_id);
        session_cookie(send(app, empty_request("POST", &uri)).await)
    }

    /// Signs in as an admin and returns the session cookie.
    pub async fn admin_cookie(app: &Router) -> String {
        session_cookie(send(app, empty_request("POST", TEST_ADMIN_SIGN_IN)).await)
    }

    fn session_cookie(response: Response<Body>) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap()
            .to_string()
    }

    pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}
