//! Response envelopes for the versioned API.
//!
//! Historical routes return bare bodies; `/api/v1` wraps single values in
//! [`ApiResponse`] and listings in [`PaginatedResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use customer_analytics_application::PaginatedResult;
use serde::Serialize;

/// `{ "success": true, "data": ..., "message": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// One page of a listing
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// 1-indexed
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<PaginatedResult<T>> for PaginatedResponse<T> {
    fn from(result: PaginatedResult<T>) -> Self {
        let pagination = PaginationMeta {
            page: result.page,
            per_page: result.page_size,
            total: result.total,
            total_pages: result.total_pages,
            has_next: result.has_next_page(),
            has_prev: result.has_previous_page(),
        };
        Self {
            items: result.items,
            pagination,
        }
    }
}

impl<T: Serialize> IntoResponse for PaginatedResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 202 with a JSON body
pub struct Accepted<T>(pub T);

impl<T: Serialize> IntoResponse for Accepted<T> {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, Json(self.0)).into_response()
    }
}
