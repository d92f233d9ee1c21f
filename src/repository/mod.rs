//! Repository layer: store contracts and their Postgres / in-memory backends

pub mod books;
pub mod loans;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, CreateBook, Loan, NewLoan, User},
};

/// Inventory of books
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<Option<Book>>;
    async fn get_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;
    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Book>>;
    /// Loans of the book whose `returned_at` is unset
    async fn count_active_loans(&self, book_id: i32) -> AppResult<i64>;
    async fn list(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)>;
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;
    async fn update(&self, book: &Book) -> AppResult<Book>;
    /// Returns false when no book had this id
    async fn delete(&self, id: i32) -> AppResult<bool>;
}

/// Outcome of a conditional loan insert
#[derive(Debug, Clone, PartialEq)]
pub enum LoanCreation {
    Created(Loan),
    /// No copy of the book was left at write time
    Unavailable,
    /// The user already had `weekly_limit` loans in the window at write time
    LimitReached,
}

/// Lending records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Conditional insert: the user's weekly count and the book's availability
    /// are re-checked atomically with the write.
    async fn create(&self, loan: &NewLoan) -> AppResult<LoanCreation>;
    async fn get(&self, id: i32) -> AppResult<Option<Loan>>;
    /// Persists `returned_at`. Returns false when the stored loan was already returned.
    async fn update(&self, loan: &Loan) -> AppResult<bool>;
    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<Loan>>;
    /// Loans borrowed at or after `since`, returned or not
    async fn count_since(&self, user_id: i32, since: DateTime<Utc>) -> AppResult<i64>;
    async fn list_active(&self, user_id: i32) -> AppResult<Vec<Loan>>;
    /// Newest borrow first
    async fn list_history(&self, user_id: i32, offset: i64, limit: i64) -> AppResult<(Vec<Loan>, i64)>;
}

/// Registered users
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, email: &str, password_hash: &str) -> AppResult<User>;
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<User>>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn BookStore>,
    pub loans: Arc<dyn LoanStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository whose stores share one in-process state
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            pool: None,
            books: store.clone(),
            loans: store.clone(),
            users: store,
        }
    }

    pub fn from_stores(
        books: Arc<dyn BookStore>,
        loans: Arc<dyn LoanStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            pool: None,
            books,
            loans,
            users,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
