//! Loan (lending record) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::Book;
use super::user::UserShort;

/// Loan record from the store. A loan is active while `returned_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Loan to be persisted, with the weekly rule the store re-checks at write time
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub book_id: i32,
    pub user_id: i32,
    pub borrowed_at: DateTime<Utc>,
    /// Loans borrowed at or after this instant count toward `weekly_limit`
    pub window_start: DateTime<Utc>,
    pub weekly_limit: i64,
}

/// Loan with book and borrower for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub book: Option<Book>,
    pub user: Option<UserShort>,
}

impl LoanDetails {
    pub fn new(loan: Loan, book: Option<Book>, user: Option<UserShort>) -> Self {
        Self {
            id: loan.id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            borrowed_at: loan.borrowed_at,
            returned_at: loan.returned_at,
            is_active: loan.is_active(),
            book,
            user,
        }
    }
}

/// Borrow request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    #[validate(range(min = 1))]
    pub book_id: i32,
}
