use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::session::AppState;
use crate::api::{success, ApiResult, Pagination};
use crate::error::AppError;
use crate::models::deal::{DealCounter, DealFilter};
use crate::models::Deal;
use crate::services::engagement;

#[derive(Debug, Deserialize)]
pub struct DealQuery {
    pub category_id: Option<Uuid>,
    pub business_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DealQuery {
    fn into_filter(self) -> DealFilter {
        let page = Pagination {
            limit: self.limit,
            offset: self.offset,
        };
        DealFilter {
            category_id: self.category_id,
            business_id: self.business_id,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            limit: page.limit(),
            offset: page.offset(),
        }
    }
}

async fn list_deals(State(state): State<AppState>, Query(query): Query<DealQuery>) -> ApiResult {
    let filter = query.into_filter();
    let deals = Deal::list_live(&state.pool, &filter).await?;

    Ok(success(json!({
        "deals": deals,
        "limit": filter.limit,
        "offset": filter.offset,
    })))
}

async fn get_deal(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let deal = Deal::find_live(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Deal"))?;

    Ok(success(json!({ "deal": deal })))
}

async fn record_view(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    engagement::track(&state.pool, id, DealCounter::Views).await;
    Ok(success(json!({})))
}

async fn record_click(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    engagement::track(&state.pool, id, DealCounter::Clicks).await;
    Ok(success(json!({})))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deals", get(list_deals))
        .route("/deals/:id", get(get_deal))
        .route("/deals/:id/view", post(record_view))
        .route("/deals/:id/click", post(record_click))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    use crate::api::testing::{body_json, empty_request, send, test_app};

    #[test]
    fn test_query_into_filter() {
        let query = DealQuery {
            category_id: None,
            business_id: None,
            search: Some("   ".to_string()),
            limit: Some(500),
            offset: None,
        };
        let filter = query.into_filter();
        assert!(filter.search.is_none());
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
    }

    #[tokio::test]
    async fn test_view_tracking_soft_fails() {
        let app = test_app();
        let uri = format!("/deals/{}/view", Uuid::new_v4());
        let (status, body) = body_json(send(&app, empty_request("POST", &uri)).await).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_click_tracking_soft_fails() {
        let app = test_app();
        let uri = format!("/deals/{}/click", Uuid::new_v4());
        let (status, _) = body_json(send(&app, empty_request("POST", &uri)).await).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_listing_database_failure() {
        let app = test_app();
        let (status, body) = body_json(send(&app, empty_request("GET", "/deals")).await).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
