//! In-memory store for books and loans
//!
//! A transaction takes exclusive ownership of the shared state, works on a
//! private copy and publishes it on commit. Dropping a transaction discards
//! the copy, so an abandoned or timed-out operation leaves no trace.
//!
//! Faults can be armed to make the next matching step fail, which lets tests
//! exercise the rollback paths of the loan engine.
//!
//! All transactions share one lock and run one at a time. Use it for tests
//! and local development only; `AppConfig::validate` refuses it in production.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{BookLookup, InventoryStore, LoanLedger, LoanStore, StoreTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{normalize_title, Book, BookDetail, CatalogEntry},
        loan::{Loan, LoanDetail, NewLoan},
    },
};

/// Store step that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Decrement,
    Increment,
    InsertLoan,
    MarkExtended,
    MarkReturned,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: HashMap<Uuid, Book>,
    titles: HashMap<String, Uuid>,
    /// Append-only ledger
    loans: Vec<Loan>,
}

impl MemoryState {
    fn loan_mut(&mut self, loan_id: Uuid) -> Option<&mut Loan> {
        self.loans.iter_mut().find(|l| l.id == loan_id)
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: MemoryState,
    faults: HashSet<FaultPoint>,
}

/// Development and test store; not for serving production traffic
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    latency: Option<std::time::Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transactional step sleeps for `latency` before running
    pub fn with_latency(latency: std::time::Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make the next `point` step fail with an internal error
    pub async fn arm_fault(&self, point: FaultPoint) {
        self.shared.lock().await.faults.insert(point);
    }

    /// Committed copy count of a book
    pub async fn availability(&self, title: &str) -> Option<i32> {
        let shared = self.shared.lock().await;
        let id = shared.state.titles.get(&normalize_title(title))?;
        shared.state.books.get(id).map(|b| b.available_copies)
    }

    /// Committed ledger, in insertion order
    pub async fn loans(&self) -> Vec<Loan> {
        self.shared.lock().await.state.loans.clone()
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Shared>,
    working: MemoryState,
    latency: Option<std::time::Duration>,
}

impl MemoryTransaction {
    async fn step(&mut self, point: Option<FaultPoint>) -> AppResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(point) = point {
            if self.guard.faults.remove(&point) {
                return Err(AppError::Internal(format!("injected fault at {:?}", point)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryTransaction {
    async fn get_availability(&mut self, book_id: Uuid) -> AppResult<Option<i32>> {
        self.step(None).await?;
        Ok(self.working.books.get(&book_id).map(|b| b.available_copies))
    }

    async fn try_decrement(&mut self, book_id: Uuid) -> AppResult<bool> {
        self.step(Some(FaultPoint::Decrement)).await?;
        match self.working.books.get_mut(&book_id) {
            Some(book) if book.available_copies > 0 => {
                book.available_copies -= 1;
                book.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_increment(&mut self, book_id: Uuid) -> AppResult<bool> {
        self.step(Some(FaultPoint::Increment)).await?;
        match self.working.books.get_mut(&book_id) {
            Some(book) => {
                book.available_copies += 1;
                book.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LoanLedger for MemoryTransaction {
    async fn find_active_loan(&mut self, user_id: i64, book_id: Uuid) -> AppResult<Option<Loan>> {
        self.step(None).await?;
        Ok(self
            .working
            .loans
            .iter()
            .find(|l| l.user_id == user_id && l.book_id == book_id && !l.is_returned)
            .cloned())
    }

    async fn get_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        self.step(None).await?;
        Ok(self.working.loans.iter().find(|l| l.id == loan_id).cloned())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        self.step(Some(FaultPoint::InsertLoan)).await?;
        let duplicate = self.working.loans.iter().any(|l| {
            l.user_id == loan.user_id && l.book_id == loan.book_id && !l.is_returned
        });
        if duplicate {
            return Err(AppError::AlreadyBorrowed);
        }

        let loan = Loan {
            id: Uuid::new_v4(),
            user_id: loan.user_id,
            book_id: loan.book_id,
            borrower_name: loan.borrower_name.clone(),
            loan_date: loan.loan_date,
            return_date: loan.return_date,
            is_returned: false,
            is_extended: false,
        };
        self.working.loans.push(loan.clone());
        Ok(loan)
    }

    async fn try_mark_extended(&mut self, loan_id: Uuid, extension: Duration) -> AppResult<bool> {
        self.step(Some(FaultPoint::MarkExtended)).await?;
        match self.working.loan_mut(loan_id) {
            Some(loan) if !loan.is_returned && !loan.is_extended => {
                loan.return_date += extension;
                loan.is_extended = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_mark_returned(&mut self, loan_id: Uuid) -> AppResult<bool> {
        self.step(Some(FaultPoint::MarkReturned)).await?;
        match self.working.loan_mut(loan_id) {
            Some(loan) if !loan.is_returned => {
                loan.is_returned = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut tx = *self;
        tx.step(Some(FaultPoint::Commit)).await?;
        tx.guard.state = tx.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let guard = self.shared.clone().lock_owned().await;
        let working = guard.state.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            latency: self.latency,
        }))
    }

    async fn seed_books(&self, entries: &[CatalogEntry]) -> AppResult<u64> {
        let mut shared = self.shared.lock().await;
        let mut working = shared.state.clone();
        let mut inserted = 0;

        for entry in entries {
            if entry.available_copies < 0 {
                return Err(AppError::Validation(format!(
                    "Book '{}' has a negative number of copies",
                    entry.title
                )));
            }
            let title = normalize_title(&entry.title);
            if working.titles.contains_key(&title) {
                continue;
            }

            let now = Utc::now();
            let book = Book {
                id: Uuid::new_v4(),
                title: title.clone(),
                available_copies: entry.available_copies,
                created_at: now,
                updated_at: now,
            };
            working.titles.insert(title, book.id);
            working.books.insert(book.id, book);
            inserted += 1;
        }

        shared.state = working;
        Ok(inserted)
    }

    async fn active_loans(&self, user_id: i64) -> AppResult<Vec<LoanDetail>> {
        let shared = self.shared.lock().await;
        let mut loans: Vec<&Loan> = shared
            .state
            .loans
            .iter()
            .filter(|l| l.user_id == user_id && !l.is_returned)
            .collect();
        loans.sort_by_key(|l| l.loan_date);

        Ok(loans
            .into_iter()
            .filter_map(|l| {
                let book = shared.state.books.get(&l.book_id)?;
                Some(l.detail(&book.title))
            })
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl BookLookup for MemoryStore {
    async fn get_book(&self, request_id: &str, title: &str) -> AppResult<BookDetail> {
        let title = normalize_title(title);
        let shared = self.shared.lock().await;
        shared
            .state
            .titles
            .get(&title)
            .and_then(|id| shared.state.books.get(id))
            .map(Book::detail)
            .ok_or_else(|| {
                tracing::debug!(request_id, "No book titled '{}'", title);
                AppError::NotFound(format!("Book '{}' not found", title))
            })
    }
}
