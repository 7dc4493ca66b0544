//! Customer endpoints.

use crate::{
    error::{ApiError, ApiResult},
    responses::{ApiResponse, PaginatedResponse},
    state::AppState,
};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Router,
};
use customer_analytics_application::{
    CustomerFilter, CustomerListItem, CustomerView, Pagination,
};
use customer_analytics_domain::{RiskTier, Segment};
use serde::Deserialize;

/// Listing query: filters plus pagination
#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub segment: Option<Segment>,
    pub risk_tier: Option<RiskTier>,
    pub churned: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Customer routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers))
        .route("/customers/:customer_id", get(get_customer))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> ApiResult<ApiResponse<CustomerView>> {
    let view = state.service.get_customer(&customer_id).await?;
    Ok(ApiResponse::success(view))
}

async fn list_customers(
    State(state): State<AppState>,
    query: Result<Query<ListCustomersQuery>, QueryRejection>,
) -> ApiResult<PaginatedResponse<CustomerListItem>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let filter = CustomerFilter {
        segment: query.segment,
        risk_tier: query.risk_tier,
        churned: query.churned,
    };
    let pagination = Pagination::new(
        query.page.unwrap_or(1),
        query
            .per_page
            .unwrap_or(state.service.config().default_page_size),
    );

    let result = state.service.list_customers(&filter, pagination).await?;
    Ok(result.into())
}
