//! Pagination helpers shared by list endpoints

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Query parameters for paginated listings
/// Checked by `PageRequest::from_query`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Items per page (default: 10, capped at 100)
    pub per_page: Option<i64>,
}

/// Validated page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// Both values must be at least 1; `per_page` is capped at `max_per_page`.
    pub fn new(page: i64, per_page: i64, max_per_page: i64) -> AppResult<Self> {
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if per_page < 1 {
            return Err(AppError::Validation("per_page must be at least 1".to_string()));
        }
        Ok(Self {
            page,
            per_page: per_page.min(max_per_page),
        })
    }

    pub fn from_query(query: &PageQuery, max_per_page: i64) -> AppResult<Self> {
        Self::new(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
            max_per_page,
        )
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
    /// Number of pages
    pub total_pages: i64,
}

impl<T> Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages: request.total_pages(total),
        }
    }
}
