//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{is_unique_violation, LoanCreation, LoanStore};
use crate::{
    error::{AppError, AppResult, LendingError},
    models::{Loan, NewLoan},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    async fn create(&self, loan: &NewLoan) -> AppResult<LoanCreation> {
        let mut tx = self.pool.begin().await?;

        // Row locks serialize borrows across server instances, user then book
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(loan.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let quantity: Option<i32> =
            sqlx::query_scalar("SELECT quantity FROM books WHERE id = $1 FOR UPDATE")
                .bind(loan.book_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(quantity) = quantity else {
            return Err(LendingError::BookNotFound.into());
        };

        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lending_records WHERE user_id = $1 AND borrowed_at >= $2",
        )
        .bind(loan.user_id)
        .bind(loan.window_start)
        .fetch_one(&mut *tx)
        .await?;

        if recent >= loan.weekly_limit {
            return Ok(LoanCreation::LimitReached);
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lending_records WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(loan.book_id)
        .fetch_one(&mut *tx)
        .await?;

        if active >= i64::from(quantity) {
            return Ok(LoanCreation::Unavailable);
        }

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO lending_records (book_id, user_id, borrowed_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.user_id)
        .bind(loan.borrowed_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Lending(LendingError::DuplicateActiveLoan)
            } else {
                AppError::Database(e)
            }
        })?;

        tx.commit().await?;

        Ok(LoanCreation::Created(created))
    }

    async fn get(&self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM lending_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    async fn update(&self, loan: &Loan) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE lending_records
            SET returned_at = $2, updated_at = NOW()
            WHERE id = $1 AND returned_at IS NULL
            "#,
        )
        .bind(loan.id)
        .bind(loan.returned_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM lending_records
            WHERE user_id = $1 AND book_id = $2 AND returned_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loan)
    }

    async fn count_since(&self, user_id: i32, since: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lending_records WHERE user_id = $1 AND borrowed_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_active(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM lending_records
            WHERE user_id = $1 AND returned_at IS NULL
            ORDER BY borrowed_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn list_history(&self, user_id: i32, offset: i64, limit: i64) -> AppResult<(Vec<Loan>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM lending_records WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM lending_records
            WHERE user_id = $1
            ORDER BY borrowed_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((loans, total))
    }
}
