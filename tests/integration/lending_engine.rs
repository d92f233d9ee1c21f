//! Lending engine behaviour against the in-memory repository

mod common;

use std::collections::HashSet;

use book_lending_server::{
    error::LendingError,
    models::{LoanDetails, PageQuery},
};
use chrono::{Duration, Utc};
use common::{rule, Fixture, DUNE_ISBN};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_dune_scenario() {
    let fx = Fixture::new();
    let dune = fx.add_book(DUNE_ISBN, 1).await;
    let (alice, bob) = (1, 2);

    let loan = assert_ok!(fx.services.loans.borrow_book(alice, dune.id).await);
    assert_eq!(fx.services.availability.available(dune.id).await.unwrap(), 0);

    assert_eq!(
        rule(fx.services.loans.borrow_book(bob, dune.id).await),
        LendingError::BookUnavailable
    );

    let returned = assert_ok!(fx.services.loans.return_book(alice, loan.id).await);
    assert!(!returned.is_active);
    assert_eq!(fx.services.availability.available(dune.id).await.unwrap(), 1);

    assert_ok!(fx.services.loans.borrow_book(bob, dune.id).await);
    assert_eq!(fx.services.availability.available(dune.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let fx = Fixture::new();
    assert_eq!(
        rule(fx.services.loans.borrow_book(1, 404).await),
        LendingError::BookNotFound
    );
}

#[tokio::test]
async fn test_second_borrow_of_same_book_is_duplicate() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 3).await;

    assert_ok!(fx.services.loans.borrow_book(1, book.id).await);
    assert_eq!(
        rule(fx.services.loans.borrow_book(1, book.id).await),
        LendingError::DuplicateActiveLoan
    );
    assert_eq!(fx.services.availability.available(book.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_duplicate_reported_before_unavailable() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 1).await;

    assert_ok!(fx.services.loans.borrow_book(1, book.id).await);
    assert_eq!(
        rule(fx.services.loans.borrow_book(1, book.id).await),
        LendingError::DuplicateActiveLoan
    );
}

#[tokio::test]
async fn test_sixth_borrow_in_window_is_rejected() {
    let fx = Fixture::new();
    let books = fx.add_books(6).await;

    for book in &books[..5] {
        assert_ok!(fx.services.loans.borrow_book(1, book.id).await);
    }
    assert_eq!(
        rule(fx.services.loans.borrow_book(1, books[5].id).await),
        LendingError::WeeklyLimitExceeded { limit: 5, days: 7 }
    );

    // The limit is per user
    assert_ok!(fx.services.loans.borrow_book(2, books[5].id).await);
}

#[tokio::test]
async fn test_returned_loans_still_count_toward_limit() {
    let fx = Fixture::new();
    let books = fx.add_books(6).await;

    for book in &books[..5] {
        let loan = assert_ok!(fx.services.loans.borrow_book(1, book.id).await);
        assert_ok!(fx.services.loans.return_book(1, loan.id).await);
    }

    assert!(fx.services.loans.get_active_borrowings(1).await.unwrap().is_empty());
    assert_eq!(
        rule(fx.services.loans.borrow_book(1, books[5].id).await),
        LendingError::WeeklyLimitExceeded { limit: 5, days: 7 }
    );
}

#[tokio::test]
async fn test_loans_outside_window_do_not_count() {
    let fx = Fixture::new();
    let books = fx.add_books(6).await;
    let long_ago = Utc::now() - Duration::days(8);

    for book in &books[..5] {
        let mut old = fx.backdated_loan(book.id, 1, long_ago).await;
        old.returned_at = Some(long_ago + Duration::days(1));
        assert!(fx.repository.loans.update(&old).await.unwrap());
    }

    for book in &books {
        let loan = fx.services.loans.borrow_book(1, book.id).await;
        if book.id == books[5].id {
            assert_eq!(rule(loan), LendingError::WeeklyLimitExceeded { limit: 5, days: 7 });
        } else {
            assert_ok!(loan);
        }
    }
}

#[tokio::test]
async fn test_return_twice() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 1).await;
    let loan = fx.services.loans.borrow_book(1, book.id).await.unwrap();

    assert_ok!(fx.services.loans.return_book(1, loan.id).await);
    assert_eq!(
        rule(fx.services.loans.return_book(1, loan.id).await),
        LendingError::AlreadyReturned
    );
}

#[tokio::test]
async fn test_return_by_other_user_is_forbidden() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 1).await;
    let loan = fx.services.loans.borrow_book(1, book.id).await.unwrap();

    assert_eq!(
        rule(fx.services.loans.return_book(2, loan.id).await),
        LendingError::NotOwner
    );
    assert_eq!(fx.services.availability.available(book.id).await.unwrap(), 0);

    fx.services.loans.return_book(1, loan.id).await.unwrap();
    assert_eq!(
        rule(fx.services.loans.return_book(2, loan.id).await),
        LendingError::NotOwner
    );
}

#[tokio::test]
async fn test_return_unknown_loan() {
    let fx = Fixture::new();
    assert_eq!(
        rule(fx.services.loans.return_book(1, 77).await),
        LendingError::LoanNotFound
    );
}

fn pages(page: i64, per_page: i64) -> PageQuery {
    PageQuery {
        page: Some(page),
        per_page: Some(per_page),
    }
}

#[tokio::test]
async fn test_history_pages_cover_everything_once() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 1).await;
    let now = Utc::now();

    for hours in 0..12 {
        let mut loan = fx.backdated_loan(book.id, 1, now - Duration::hours(hours * 20)).await;
        loan.returned_at = Some(now);
        fx.repository.loans.update(&loan).await.unwrap();
    }

    let mut seen: Vec<LoanDetails> = Vec::new();
    for page in 1..=3 {
        let result = fx
            .services
            .loans
            .get_user_borrowing_history(1, &pages(page, 5))
            .await
            .unwrap();
        assert_eq!(result.total, 12);
        assert_eq!(result.total_pages, 3);
        seen.extend(result.items);
    }

    assert_eq!(seen.len(), 12);
    let ids: HashSet<i32> = seen.iter().map(|l| l.id).collect();
    assert_eq!(ids.len(), 12);
    assert!(seen.windows(2).all(|w| w[0].borrowed_at >= w[1].borrowed_at));
    assert!(seen.iter().all(|l| l.book.as_ref().is_some_and(|b| b.id == book.id)));

    let past_end = fx
        .services
        .loans
        .get_user_borrowing_history(1, &pages(4, 5))
        .await
        .unwrap();
    assert!(past_end.items.is_empty());
}

#[tokio::test]
async fn test_history_of_new_user_is_empty() {
    let fx = Fixture::new();
    let history = fx
        .services
        .loans
        .get_user_borrowing_history(9, &PageQuery::default())
        .await
        .unwrap();
    assert_eq!(history.total, 0);
    assert_eq!(history.total_pages, 0);
    assert!(history.items.is_empty());

    assert_err!(fx.services.loans.get_user_borrowing_history(9, &pages(1, 0)).await);
}

#[tokio::test]
async fn test_active_borrowings_exclude_returned() {
    let fx = Fixture::new();
    let books = fx.add_books(3).await;

    let mut loans = Vec::new();
    for book in &books {
        loans.push(fx.services.loans.borrow_book(1, book.id).await.unwrap());
    }
    fx.services.loans.return_book(1, loans[1].id).await.unwrap();

    let active = fx.services.loans.get_active_borrowings(1).await.unwrap();
    let ids: HashSet<i32> = active.iter().map(|l| l.id).collect();
    assert_eq!(ids, HashSet::from([loans[0].id, loans[2].id]));
    assert!(active.iter().all(|l| l.is_active));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_borrowers_get_exactly_the_available_copies() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 3).await;

    let mut tasks = Vec::new();
    for user_id in 1..=20 {
        let loans = fx.services.loans.clone();
        let book_id = book.id;
        tasks.push(tokio::spawn(async move { loans.borrow_book(user_id, book_id).await }));
    }

    let mut granted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => granted += 1,
            result => assert_eq!(rule(result), LendingError::BookUnavailable),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(fx.services.availability.available(book.id).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_borrows_by_one_user_respect_weekly_limit() {
    let fx = Fixture::new();
    let books = fx.add_books(10).await;

    let mut tasks = Vec::new();
    for book in &books {
        let loans = fx.services.loans.clone();
        let book_id = book.id;
        tasks.push(tokio::spawn(async move { loans.borrow_book(1, book_id).await }));
    }

    let mut granted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => granted += 1,
            result => assert_eq!(rule(result), LendingError::WeeklyLimitExceeded { limit: 5, days: 7 }),
        }
    }

    assert_eq!(granted, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_returns_succeed_once() {
    let fx = Fixture::new();
    let book = fx.add_book(DUNE_ISBN, 1).await;
    let loan = fx.services.loans.borrow_book(1, book.id).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let loans = fx.services.loans.clone();
        let loan_id = loan.id;
        tasks.push(tokio::spawn(async move { loans.return_book(1, loan_id).await }));
    }

    let mut returned = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => returned += 1,
            result => assert_eq!(rule(result), LendingError::AlreadyReturned),
        }
    }

    assert_eq!(returned, 1);
    assert_eq!(fx.services.availability.available(book.id).await.unwrap(), 1);
}
