//! Data models for the lending server

pub mod book;
pub mod loan;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookAvailability, CreateBook, UpdateBook};
pub use loan::{Loan, LoanDetails, NewLoan};
pub use pagination::{PageQuery, PageRequest, Paginated};
pub use user::{User, UserClaims, UserShort};
