//! Error types for the lending server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchLoan = 6,
    BookNotAvailable = 7,
    Duplicate = 8,
    WeeklyLimitReached = 9,
    NotOwner = 10,
    AlreadyReturned = 11,
    BadValue = 12,
    NoSuchData = 13,
    TooManyRequests = 14,
}

/// Broad category of a lending rule violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
}

/// Outcome of a borrow/return precondition check
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LendingError {
    #[error("Book not found")]
    BookNotFound,

    #[error("You have already borrowed this book")]
    DuplicateActiveLoan,

    #[error("Borrowing limit exceeded: maximum {limit} books per {days} days")]
    WeeklyLimitExceeded { limit: i64, days: i64 },

    #[error("Book is not available for borrowing")]
    BookUnavailable,

    #[error("Lending record not found")]
    LoanNotFound,

    #[error("This lending record does not belong to you")]
    NotOwner,

    #[error("Book has already been returned")]
    AlreadyReturned,
}

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::BookNotFound | LendingError::LoanNotFound => ErrorKind::NotFound,
            LendingError::NotOwner => ErrorKind::Forbidden,
            LendingError::DuplicateActiveLoan
            | LendingError::WeeklyLimitExceeded { .. }
            | LendingError::BookUnavailable
            | LendingError::AlreadyReturned => ErrorKind::Conflict,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            LendingError::BookNotFound => ErrorCode::NoSuchBook,
            LendingError::DuplicateActiveLoan => ErrorCode::Duplicate,
            LendingError::WeeklyLimitExceeded { .. } => ErrorCode::WeeklyLimitReached,
            LendingError::BookUnavailable => ErrorCode::BookNotAvailable,
            LendingError::LoanNotFound => ErrorCode::NoSuchLoan,
            LendingError::NotOwner => ErrorCode::NotOwner,
            LendingError::AlreadyReturned => ErrorCode::AlreadyReturned,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Lending(#[from] LendingError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Too many requests")]
    TooManyRequests,
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Lending(e) => {
                let status = match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                };
                (status, e.code())
            }
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, ErrorCode::TooManyRequests),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::TooManyRequests => "Too many requests, please try again later".to_string(),
            AppError::Lending(e) => e.to_string(),
            AppError::Authentication(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
