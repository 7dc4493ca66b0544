//! Application Services
//!
//! Query and command entry points consumed by the HTTP layer.

mod analytics;

pub use analytics::*;

use customer_analytics_common::config::AppConfig;
use serde::Serialize;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum page size for list operations
    pub max_page_size: u32,
    /// Default page size for list operations
    pub default_page_size: u32,
    /// Whether `trigger_processing` starts passes in this process
    pub accept_triggers: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            default_page_size: 20,
            accept_triggers: true,
        }
    }
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            accept_triggers: config.aggregation.api_triggers,
            ..Self::default()
        }
    }
}

/// Pagination parameters for list operations
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) as u64 * self.page_size as u64
    }

    pub fn limit(&self) -> u32 {
        self.page_size
    }

    /// Clamp to a valid page and a page size within `max`.
    pub fn clamped(self, max: u32) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, max.max(1)),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// Paginated result
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        let page_size = pagination.page_size.max(1) as u64;
        let total_pages = total.div_ceil(page_size) as u32;
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages,
        }
    }

    pub fn empty(pagination: &Pagination) -> Self {
        Self::new(Vec::new(), 0, pagination)
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let pagination = Pagination::new(1, 20);
        assert_eq!(pagination.offset(), 0);
        assert_eq!(pagination.limit(), 20);

        let pagination = Pagination::new(3, 10);
        assert_eq!(pagination.offset(), 20);
    }

    #[test]
    fn test_pagination_clamped() {
        let pagination = Pagination::new(0, 1000).clamped(100);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.page_size, 100);

        let pagination = Pagination::new(2, 0).clamped(100);
        assert_eq!(pagination.page_size, 1);
    }

    #[test]
    fn test_paginated_result() {
        let items = vec![1, 2, 3];
        let pagination = Pagination::new(1, 10);
        let result = PaginatedResult::new(items, 25, &pagination);

        assert_eq!(result.total, 25);
        assert_eq!(result.total_pages, 3);
        assert!(result.has_next_page());
        assert!(!result.has_previous_page());
    }

    #[test]
    fn test_empty_result() {
        let result: PaginatedResult<u8> = PaginatedResult::empty(&Pagination::default());
        assert_eq!(result.total_pages, 0);
        assert!(!result.has_next_page());
    }
}
