//! Book inventory management

use validator::Validate;

use super::availability::AvailabilityCalculator;
use crate::{
    error::{AppError, AppResult, LendingError},
    models::{Book, BookAvailability, CreateBook, PageQuery, PageRequest, Paginated, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    availability: AvailabilityCalculator,
    max_page_size: i64,
}

impl CatalogService {
    pub fn new(repository: Repository, max_page_size: i64) -> Self {
        Self {
            availability: AvailabilityCalculator::new(repository.clone()),
            repository,
            max_page_size,
        }
    }

    pub async fn list_books(&self, query: &PageQuery) -> AppResult<Paginated<Book>> {
        let request = PageRequest::from_query(query, self.max_page_size)?;
        let (books, total) = self
            .repository
            .books
            .list(request.offset(), request.per_page)
            .await?;
        Ok(Paginated::new(books, total, request))
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .books
            .get(id)
            .await?
            .ok_or_else(|| LendingError::BookNotFound.into())
    }

    pub async fn availability(&self, id: i32) -> AppResult<BookAvailability> {
        self.availability.availability(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if self.repository.books.get_by_isbn(&book.isbn).await?.is_some() {
            return Err(AppError::Conflict("Book with this ISBN already exists".to_string()));
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book created");
        Ok(created)
    }

    /// Apply a partial update. Lowering `quantity` below the copies on loan is
    /// allowed; availability then reads 0 until enough copies come back.
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;

        let mut book = self.get_book(id).await?;

        if let Some(isbn) = update.isbn.as_deref().filter(|isbn| *isbn != book.isbn) {
            if self.repository.books.get_by_isbn(isbn).await?.is_some() {
                return Err(AppError::Conflict("Book with this ISBN already exists".to_string()));
            }
        }

        update.apply_to(&mut book);
        self.repository.books.update(&book).await
    }

    /// Books with copies out on loan cannot be deleted
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        if self.repository.books.count_active_loans(id).await? > 0 {
            return Err(AppError::Conflict(
                "Book has active loans and cannot be deleted".to_string(),
            ));
        }

        if !self.repository.books.delete(id).await? {
            return Err(LendingError::BookNotFound.into());
        }

        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
