//! Repository layer: inventory store, loan ledger and the transactions spanning them

pub mod books;
pub mod loans;
pub mod memory;

use async_trait::async_trait;
use chrono::Duration;
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{BookDetail, CatalogEntry},
        loan::{Loan, LoanDetail, NewLoan},
    },
};

pub use memory::{FaultPoint, MemoryStore};

/// Per-title available-copy counters.
///
/// Mutations are single conditional updates; a `false` outcome means the guard
/// did not hold and nothing was changed.
#[async_trait]
pub trait InventoryStore: Send {
    /// Current counter, `None` when the book does not exist
    async fn get_availability(&mut self, book_id: Uuid) -> AppResult<Option<i32>>;

    /// `available_copies - 1` guarded by `available_copies > 0`
    async fn try_decrement(&mut self, book_id: Uuid) -> AppResult<bool>;

    /// `available_copies + 1`; `false` only when the book row is missing
    async fn try_increment(&mut self, book_id: Uuid) -> AppResult<bool>;
}

/// Loan records. Rows are never deleted; closing a loan sets `is_returned`.
#[async_trait]
pub trait LoanLedger: Send {
    /// The non-returned loan of `user_id` for `book_id`, if any
    async fn find_active_loan(&mut self, user_id: i64, book_id: Uuid) -> AppResult<Option<Loan>>;

    async fn get_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    /// Pushes `return_date` back by `extension` and sets `is_extended`,
    /// guarded by `is_returned = false AND is_extended = false`
    async fn try_mark_extended(&mut self, loan_id: Uuid, extension: Duration) -> AppResult<bool>;

    /// Sets `is_returned`, guarded by `is_returned = false`
    async fn try_mark_returned(&mut self, loan_id: Uuid) -> AppResult<bool>;
}

/// One open transaction over both the inventory and the ledger.
///
/// Dropping a transaction without committing it rolls it back.
#[async_trait]
pub trait StoreTransaction: InventoryStore + LoanLedger {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Backing store for books and loans
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;

    /// Insert catalog entries, skipping titles that already exist.
    /// Returns the number of books actually inserted.
    async fn seed_books(&self, entries: &[CatalogEntry]) -> AppResult<u64>;

    /// Active loans of a user, oldest first
    async fn active_loans(&self, user_id: i64) -> AppResult<Vec<LoanDetail>>;

    /// Connectivity check behind `/ready`
    async fn ping(&self) -> AppResult<()>;
}

/// Resolves a (normalized) title to the book it names
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookLookup: Send + Sync {
    async fn get_book(&self, request_id: &str, title: &str) -> AppResult<BookDetail>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Open Postgres transaction; the inventory side lives in `books`, the ledger side in `loans`
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LoanStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn seed_books(&self, entries: &[CatalogEntry]) -> AppResult<u64> {
        self.books.seed(entries).await
    }

    async fn active_loans(&self, user_id: i64) -> AppResult<Vec<LoanDetail>> {
        self.loans.get_user_loans(user_id).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl BookLookup for Repository {
    async fn get_book(&self, request_id: &str, title: &str) -> AppResult<BookDetail> {
        self.books.get_by_title(request_id, title).await
    }
}
