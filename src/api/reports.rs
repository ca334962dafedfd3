use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::session::AppState;
use crate::api::{success, ApiResult};
use crate::services::reporting;

#[derive(Debug, Deserialize)]
pub struct AudienceQuery {
    pub top: Option<i64>,
}

async fn dashboard(State(state): State<AppState>) -> ApiResult {
    let stats = reporting::dashboard(&state.pool).await?;
    Ok(success(json!({ "stats": stats })))
}

async fn audience(State(state): State<AppState>, Query(query): Query<AudienceQuery>) -> ApiResult {
    let audience = reporting::audience(&state.pool, query.top).await?;
    Ok(success(json!({ "audience": audience })))
}

async fn heatmap(State(state): State<AppState>) -> ApiResult {
    let points = reporting::heatmap(&state.pool).await?;
    Ok(success(json!({ "points": points })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/reports/dashboard", get(dashboard))
        .route("/admin/reports/audience", get(audience))
        .route("/admin/reports/heatmap", get(heatmap))
}
