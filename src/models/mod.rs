//! Data models for e-lib

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{BookDetail, BookRequest, CatalogEntry};
pub use loan::{Loan, LoanDetail, LoanStatus};
pub use user::{UserClaims, UserIdentity};
