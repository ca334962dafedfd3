use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Instant;

use crate::api::middleware::session::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    Configured,
    NotConfigured,
}

impl From<bool> for Integration {
    fn from(configured: bool) -> Self {
        if configured {
            Integration::Configured
        } else {
            Integration::NotConfigured
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub status: Health,
    pub response_time_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Dependencies {
    pub database: DatabaseHealth,
    pub mail: Integration,
    pub billing: Integration,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: Health,
    pub timestamp: String,
    pub version: &'static str,
    pub dependencies: Dependencies,
}

/// 200 while the database answers, 503 otherwise. Mail and billing are
/// optional and only reported.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let database = ping_database(&state.pool).await;
    let status = database.status;

    let report = HealthReport {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        dependencies: Dependencies {
            database,
            mail: state.config.smtp.is_some().into(),
            billing: state.billing.is_some().into(),
        },
    };

    tracing::debug!(status = ?report.status, "Health check completed");

    let code = match status {
        Health::Healthy => StatusCode::OK,
        Health::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

async fn ping_database(pool: &PgPool) -> DatabaseHealth {
    let start = Instant::now();
    let result = sqlx::query("SELECT 1").execute(pool).await;
    let response_time_ms = start.elapsed().as_millis();

    match result {
        Ok(_) => DatabaseHealth {
            status: Health::Healthy,
            response_time_ms,
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            DatabaseHealth {
                status: Health::Unhealthy,
                response_time_ms,
                error: Some(format!("Database error: {}", e)),
            }
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{body_json, empty_request, send, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_unreachable_database() {
        let app = test_app();
        let (status, body) = body_json(send(&app, empty_request("GET", "/health")).await).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["dependencies"]["database"]["status"], "unhealthy");
        assert_eq!(body["dependencies"]["billing"], "not_configured");
        assert_eq!(body["dependencies"]["mail"], "not_configured");
    }
}
