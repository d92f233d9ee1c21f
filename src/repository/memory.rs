//! In-process store backing all three repositories.
//!
//! Every table lives behind one `RwLock`, so each store call is atomic with
//! respect to the others. Used by the test suites and by local runs with
//! `database.backend = "memory"`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BookStore, LoanCreation, LoanStore, UserStore};
use crate::{
    error::{AppError, AppResult, LendingError},
    models::{Book, CreateBook, Loan, NewLoan, User},
};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    loans: BTreeMap<i32, Loan>,
    users: BTreeMap<i32, User>,
    last_book_id: i32,
    last_loan_id: i32,
    last_user_id: i32,
}

impl Tables {
    fn active_loans(&self, book_id: i32) -> i64 {
        self.loans
            .values()
            .filter(|l| l.book_id == book_id && l.is_active())
            .count() as i64
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

/// Newest borrow first, ties broken by id
fn newest_first(a: &Loan, b: &Loan) -> std::cmp::Ordering {
    b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id))
}

fn page<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn get(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn get_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().find(|b| b.isbn == isbn).cloned())
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.books.get(id).cloned()).collect())
    }

    async fn count_active_loans(&self, book_id: i32) -> AppResult<i64> {
        Ok(self.tables.read().await.active_loans(book_id))
    }

    async fn list(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.tables.read().await;
        let books: Vec<Book> = tables.books.values().cloned().collect();
        let total = books.len() as i64;
        Ok((page(books, offset, limit), total))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        if tables.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::Conflict("Book with this ISBN already exists".to_string()));
        }

        tables.last_book_id += 1;
        let now = Utc::now();
        let created = Book {
            id: tables.last_book_id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            quantity: book.quantity,
            category: book.category.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, book: &Book) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        if tables.books.values().any(|b| b.isbn == book.isbn && b.id != book.id) {
            return Err(AppError::Conflict("Book with this ISBN already exists".to_string()));
        }

        let stored = tables
            .books
            .get_mut(&book.id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))?;
        *stored = Book {
            updated_at: Utc::now(),
            created_at: stored.created_at,
            ..book.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.loans.values().any(|l| l.book_id == id) {
            return Err(AppError::Conflict(
                "Book has lending history and cannot be deleted".to_string(),
            ));
        }
        Ok(tables.books.remove(&id).is_some())
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn create(&self, loan: &NewLoan) -> AppResult<LoanCreation> {
        let mut tables = self.tables.write().await;

        let quantity = tables
            .books
            .get(&loan.book_id)
            .map(|b| i64::from(b.quantity))
            .ok_or(LendingError::BookNotFound)?;

        let recent = tables
            .loans
            .values()
            .filter(|l| l.user_id == loan.user_id && l.borrowed_at >= loan.window_start)
            .count() as i64;
        if recent >= loan.weekly_limit {
            return Ok(LoanCreation::LimitReached);
        }

        if tables.active_loans(loan.book_id) >= quantity {
            return Ok(LoanCreation::Unavailable);
        }

        let duplicate = tables
            .loans
            .values()
            .any(|l| l.user_id == loan.user_id && l.book_id == loan.book_id && l.is_active());
        if duplicate {
            return Err(LendingError::DuplicateActiveLoan.into());
        }

        tables.last_loan_id += 1;
        let now = Utc::now();
        let created = Loan {
            id: tables.last_loan_id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            borrowed_at: loan.borrowed_at,
            returned_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.loans.insert(created.id, created.clone());
        Ok(LoanCreation::Created(created))
    }

    async fn get(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.tables.read().await.loans.get(&id).cloned())
    }

    async fn update(&self, loan: &Loan) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.loans.get_mut(&loan.id) {
            Some(stored) if stored.is_active() => {
                stored.returned_at = loan.returned_at;
                stored.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .values()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.is_active())
            .cloned())
    }

    async fn count_since(&self, user_id: i32, since: DateTime<Utc>) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .values()
            .filter(|l| l.user_id == user_id && l.borrowed_at >= since)
            .count() as i64)
    }

    async fn list_active(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| l.user_id == user_id && l.is_active())
            .cloned()
            .collect();
        loans.sort_by(newest_first);
        Ok(loans)
    }

    async fn list_history(&self, user_id: i32, offset: i64, limit: i64) -> AppResult<(Vec<Loan>, i64)> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        loans.sort_by(newest_first);
        let total = loans.len() as i64;
        Ok((page(loans, offset, limit), total))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, email: &str, password_hash: &str) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }

        tables.last_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.last_user_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }
}
