//! Lending engine: borrowing, returning and loan listings

use std::collections::HashMap;

use chrono::{Duration, Utc};

use super::{
    availability::AvailabilityCalculator,
    locks::{KeyedLocks, LockKey},
};
use crate::{
    config::LendingConfig,
    error::{AppError, AppResult, LendingError},
    models::{Book, Loan, LoanDetails, NewLoan, PageQuery, PageRequest, Paginated, UserShort},
    repository::{LoanCreation, Repository},
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    availability: AvailabilityCalculator,
    rules: LendingConfig,
    locks: KeyedLocks<LockKey>,
}

impl LoansService {
    pub fn new(repository: Repository, rules: LendingConfig) -> Self {
        Self {
            availability: AvailabilityCalculator::new(repository.clone()),
            repository,
            rules,
            locks: KeyedLocks::new(),
        }
    }

    /// Borrow a book for a user.
    ///
    /// Rules are checked in order and the first failing one is reported:
    /// the book exists, the user has no active loan of it, the user borrowed
    /// fewer than `weekly_limit` books within the window, a copy is available.
    pub async fn borrow_book(&self, user_id: i32, book_id: i32) -> AppResult<LoanDetails> {
        let result = self.borrow_locked(user_id, book_id).await;

        match &result {
            Ok(loan) => tracing::info!(user_id, book_id, loan_id = loan.id, "Book borrowed"),
            Err(AppError::Lending(reason)) => {
                tracing::debug!(user_id, book_id, %reason, "Borrow rejected")
            }
            Err(_) => {}
        }

        result
    }

    async fn borrow_locked(&self, user_id: i32, book_id: i32) -> AppResult<LoanDetails> {
        // Same order everywhere: user, then book
        let _user = self.locks.lock(LockKey::User(user_id)).await;
        let _book = self.locks.lock(LockKey::Book(book_id)).await;

        let book = self
            .repository
            .books
            .get(book_id)
            .await?
            .ok_or(LendingError::BookNotFound)?;

        if self.repository.loans.find_active(user_id, book_id).await?.is_some() {
            return Err(LendingError::DuplicateActiveLoan.into());
        }

        let now = Utc::now();
        let window_start = now - Duration::days(self.rules.window_days);
        let recent = self.repository.loans.count_since(user_id, window_start).await?;
        if recent >= self.rules.weekly_limit {
            return Err(self.weekly_limit_exceeded().into());
        }

        if self.availability.available_for(&book).await? <= 0 {
            return Err(LendingError::BookUnavailable.into());
        }

        // Looked up before the write so that a failure here leaves no loan behind
        let user = self
            .repository
            .users
            .get_by_id(user_id)
            .await?
            .map(UserShort::from);

        let new_loan = NewLoan {
            book_id,
            user_id,
            borrowed_at: now,
            window_start,
            weekly_limit: self.rules.weekly_limit,
        };

        // Another instance may have borrowed between check and write
        let loan = match self.repository.loans.create(&new_loan).await? {
            LoanCreation::Created(loan) => loan,
            LoanCreation::Unavailable => return Err(LendingError::BookUnavailable.into()),
            LoanCreation::LimitReached => return Err(self.weekly_limit_exceeded().into()),
        };

        Ok(LoanDetails::new(loan, Some(book), user))
    }

    fn weekly_limit_exceeded(&self) -> LendingError {
        LendingError::WeeklyLimitExceeded {
            limit: self.rules.weekly_limit,
            days: self.rules.window_days,
        }
    }

    /// Return a loan owned by `user_id`
    pub async fn return_book(&self, user_id: i32, loan_id: i32) -> AppResult<LoanDetails> {
        let result = self.return_locked(user_id, loan_id).await;

        match &result {
            Ok(loan) => tracing::info!(user_id, loan_id, book_id = loan.book_id, "Book returned"),
            Err(AppError::Lending(reason)) => {
                tracing::debug!(user_id, loan_id, %reason, "Return rejected")
            }
            Err(_) => {}
        }

        result
    }

    async fn return_locked(&self, user_id: i32, loan_id: i32) -> AppResult<LoanDetails> {
        let _loan = self.locks.lock(LockKey::Loan(loan_id)).await;

        let mut loan = self
            .repository
            .loans
            .get(loan_id)
            .await?
            .ok_or(LendingError::LoanNotFound)?;

        if loan.user_id != user_id {
            return Err(LendingError::NotOwner.into());
        }
        if !loan.is_active() {
            return Err(LendingError::AlreadyReturned.into());
        }

        loan.returned_at = Some(Utc::now());
        if !self.repository.loans.update(&loan).await? {
            return Err(LendingError::AlreadyReturned.into());
        }

        // Already committed, so book and borrower are best effort
        let details = match self.with_details(vec![loan.clone()]).await {
            Ok(mut details) => details.pop(),
            Err(e) => {
                tracing::warn!(user_id, loan_id, "Returned loan not enriched: {}", e);
                None
            }
        };

        Ok(details.unwrap_or_else(|| LoanDetails::new(loan, None, None)))
    }

    /// Page of the user's loans, newest borrow first
    pub async fn get_user_borrowing_history(
        &self,
        user_id: i32,
        query: &PageQuery,
    ) -> AppResult<Paginated<LoanDetails>> {
        let request = PageRequest::from_query(query, self.rules.max_page_size)?;

        let (loans, total) = self
            .repository
            .loans
            .list_history(user_id, request.offset(), request.per_page)
            .await?;

        Ok(Paginated::new(self.with_details(loans).await?, total, request))
    }

    /// All unreturned loans of the user
    pub async fn get_active_borrowings(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        let loans = self.repository.loans.list_active(user_id).await?;
        self.with_details(loans).await
    }

    /// Attach book and borrower to each loan, fetching each table once
    async fn with_details(&self, loans: Vec<Loan>) -> AppResult<Vec<LoanDetails>> {
        if loans.is_empty() {
            return Ok(Vec::new());
        }

        let book_ids = distinct(loans.iter().map(|l| l.book_id));
        let user_ids = distinct(loans.iter().map(|l| l.user_id));

        let books: HashMap<i32, Book> = self
            .repository
            .books
            .get_many(&book_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        let users: HashMap<i32, UserShort> = self
            .repository
            .users
            .get_many(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, UserShort::from(u)))
            .collect();

        Ok(loans
            .into_iter()
            .map(|loan| {
                let book = books.get(&loan.book_id).cloned();
                let user = users.get(&loan.user_id).cloned();
                LoanDetails::new(loan, book, user)
            })
            .collect())
    }
}

fn distinct(ids: impl Iterator<Item = i32>) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
