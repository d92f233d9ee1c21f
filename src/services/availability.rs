//! Availability of books: owned copies minus active loans

use crate::{
    error::{AppResult, LendingError},
    models::{Book, BookAvailability},
    repository::Repository,
};

#[derive(Clone)]
pub struct AvailabilityCalculator {
    repository: Repository,
}

impl AvailabilityCalculator {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Copies of the book that can be borrowed right now
    pub async fn available(&self, book_id: i32) -> AppResult<i64> {
        let book = self
            .repository
            .books
            .get(book_id)
            .await?
            .ok_or(LendingError::BookNotFound)?;
        self.available_for(&book).await
    }

    /// Same as [`available`](Self::available) for an already loaded book
    pub async fn available_for(&self, book: &Book) -> AppResult<i64> {
        let active = self.repository.books.count_active_loans(book.id).await?;
        Ok(remaining_copies(book.quantity, active))
    }

    pub async fn availability(&self, book_id: i32) -> AppResult<BookAvailability> {
        let book = self
            .repository
            .books
            .get(book_id)
            .await?
            .ok_or(LendingError::BookNotFound)?;
        let available = self.available_for(&book).await?;

        Ok(BookAvailability {
            book_id: book.id,
            quantity: book.quantity,
            available,
        })
    }
}

/// Clamped to `[0, quantity]`: the catalog may lower `quantity` below the
/// number of copies still out on loan.
fn remaining_copies(quantity: i32, active_loans: i64) -> i64 {
    let quantity = i64::from(quantity.max(0));
    (quantity - active_loans).clamp(0, quantity)
}
