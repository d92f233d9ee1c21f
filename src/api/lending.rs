//! Borrowing and returning endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{loan::BorrowRequest, LoanDetails, PageQuery, Paginated},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow a book
#[utoipa::path(
    post,
    path = "/lending/borrow",
    tag = "lending",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = LoanDetails),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Already borrowed, weekly limit reached or no copy available")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    request.validate()?;

    let loan = state
        .services
        .loans
        .borrow_book(claims.user_id, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/lending/return/{id}",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Lending record ID")),
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 403, description = "Lending record belongs to another user"),
        (status = 404, description = "Lending record not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.return_book(claims.user_id, loan_id).await?;
    Ok(Json(loan))
}

/// Borrowing history of the current user, newest first
#[utoipa::path(
    get,
    path = "/lending/history",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Page of lending records", body = Paginated<LoanDetails>),
        (status = 400, description = "Invalid page parameters")
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<LoanDetails>>> {
    let history = state
        .services
        .loans
        .get_user_borrowing_history(claims.user_id, &query)
        .await?;
    Ok(Json(history))
}

/// Books the current user has not returned yet
#[utoipa::path(
    get,
    path = "/lending/active",
    tag = "lending",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active lending records", body = Vec<LoanDetails>)
    )
)]
pub async fn get_active(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.get_active_borrowings(claims.user_id).await?;
    Ok(Json(loans))
}
