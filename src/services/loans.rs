//! Loan management service
//!
//! Borrow, extend and return each run as one store transaction that commits
//! or rolls back as a unit. There is no in-process locking: the guarded
//! mutations of the inventory store and loan ledger decide every race, and
//! a `false` outcome from one of them is turned into the matching conflict.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult, StatusClass},
    models::{
        book::BookDetail,
        loan::{Loan, LoanDetail, NewLoan},
        user::UserIdentity,
    },
    repository::{BookLookup, LoanStore, StoreTransaction},
};

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LoanStore>,
    lookup: Arc<dyn BookLookup>,
    policy: LoansConfig,
}

impl LoansService {
    pub fn new(store: Arc<dyn LoanStore>, lookup: Arc<dyn BookLookup>, policy: LoansConfig) -> Self {
        Self {
            store,
            lookup,
            policy,
        }
    }

    /// Get active loans for a user
    pub async fn get_user_loans(&self, user_id: i64) -> AppResult<Vec<LoanDetail>> {
        self.store.active_loans(user_id).await
    }

    /// Resolve `title` and borrow it
    pub async fn borrow_book_by_title(
        &self,
        request_id: &str,
        user: &UserIdentity,
        title: &str,
    ) -> AppResult<LoanDetail> {
        self.with_deadline(request_id, "borrow", async {
            let book = self.lookup.get_book(request_id, title).await?;
            self.run_borrow(request_id, user, &book).await
        })
        .await
    }

    /// Resolve `title` and extend the caller's loan of it
    pub async fn extend_book_loan_by_title(
        &self,
        request_id: &str,
        user_id: i64,
        title: &str,
    ) -> AppResult<LoanDetail> {
        self.with_deadline(request_id, "extend", async {
            let book = self.lookup.get_book(request_id, title).await?;
            self.run_extend(request_id, user_id, &book).await
        })
        .await
    }

    /// Resolve `title` and return the caller's copy
    pub async fn return_book_by_title(
        &self,
        request_id: &str,
        user_id: i64,
        title: &str,
    ) -> AppResult<LoanDetail> {
        self.with_deadline(request_id, "return", async {
            let book = self.lookup.get_book(request_id, title).await?;
            let loan = self.run_return(request_id, user_id, book.id).await?;
            Ok(loan.detail(&book.title))
        })
        .await
    }

    /// Borrow one copy of `book` for `user`.
    ///
    /// Fails with `AlreadyBorrowed` while the user still holds an active loan
    /// of the title and with `OutOfStock` when no copy is left. The copy
    /// decrement and the loan insert commit together.
    pub async fn borrow_book(
        &self,
        request_id: &str,
        user: &UserIdentity,
        book: &BookDetail,
    ) -> AppResult<LoanDetail> {
        self.with_deadline(request_id, "borrow", self.run_borrow(request_id, user, book))
            .await
    }

    async fn run_borrow(
        &self,
        request_id: &str,
        user: &UserIdentity,
        book: &BookDetail,
    ) -> AppResult<LoanDetail> {
        let mut tx = self.store.begin().await?;
        let result = self.borrow_in(tx.as_mut(), user, book).await;
        finish(tx, result, request_id, "borrow", user.id, book.id).await
    }

    async fn borrow_in(
        &self,
        tx: &mut dyn StoreTransaction,
        user: &UserIdentity,
        book: &BookDetail,
    ) -> AppResult<LoanDetail> {
        let period = self
            .policy
            .loan_period()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        // Best-effort read; the decrement guard below is what prevents overselling.
        if tx.find_active_loan(user.id, book.id).await?.is_some() {
            return Err(AppError::AlreadyBorrowed);
        }

        if !tx.try_decrement(book.id).await? {
            return Err(AppError::OutOfStock(book.title.clone()));
        }

        let new_loan = NewLoan::starting_now(user, book.id, period);
        let loan = tx.insert_loan(&new_loan).await?;
        Ok(loan.detail(&book.title))
    }

    /// Push the due date of the user's active loan back by the extension period.
    ///
    /// A loan can be extended once; the second attempt fails with `AlreadyExtended`.
    pub async fn extend_book_loan(
        &self,
        request_id: &str,
        user_id: i64,
        book: &BookDetail,
    ) -> AppResult<LoanDetail> {
        self.with_deadline(request_id, "extend", self.run_extend(request_id, user_id, book))
            .await
    }

    async fn run_extend(
        &self,
        request_id: &str,
        user_id: i64,
        book: &BookDetail,
    ) -> AppResult<LoanDetail> {
        let mut tx = self.store.begin().await?;
        let result = self.extend_in(tx.as_mut(), user_id, book).await;
        finish(tx, result, request_id, "extend", user_id, book.id).await
    }

    async fn extend_in(
        &self,
        tx: &mut dyn StoreTransaction,
        user_id: i64,
        book: &BookDetail,
    ) -> AppResult<LoanDetail> {
        let extension = self
            .policy
            .extension_period()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let loan = tx
            .find_active_loan(user_id, book.id)
            .await?
            .ok_or(AppError::NoActiveLoan)?;

        if !loan.status().can_extend() {
            return Err(AppError::AlreadyExtended);
        }

        // Zero rows means the loan was returned or extended since it was read.
        if !tx.try_mark_extended(loan.id, extension).await? {
            return Err(AppError::NoActiveLoan);
        }

        let extended = tx
            .get_loan(loan.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("loan {} vanished after extension", loan.id)))?;
        Ok(extended.detail(&book.title))
    }

    /// Close the user's active loan of `book_id` and put the copy back.
    ///
    /// Returns the closed loan. A repeated return finds no active loan.
    pub async fn return_book(&self, request_id: &str, user_id: i64, book_id: Uuid) -> AppResult<Loan> {
        self.with_deadline(request_id, "return", self.run_return(request_id, user_id, book_id))
            .await
    }

    async fn run_return(&self, request_id: &str, user_id: i64, book_id: Uuid) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;
        let result = return_in(tx.as_mut(), user_id, book_id).await;
        finish(tx, result, request_id, "return", user_id, book_id).await
    }

    async fn with_deadline<T, F>(&self, request_id: &str, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let limit = self.policy.operation_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                // The transaction was dropped with the future and is rolled back.
                tracing::error!(request_id, "{} timed out after {:?}", operation, limit);
                Err(AppError::Timeout(limit.as_secs()))
            }
        }
    }
}

async fn return_in(tx: &mut dyn StoreTransaction, user_id: i64, book_id: Uuid) -> AppResult<Loan> {
    let loan = tx
        .find_active_loan(user_id, book_id)
        .await?
        .ok_or(AppError::NoActiveLoan)?;

    if !loan.status().can_return() || !tx.try_mark_returned(loan.id).await? {
        return Err(AppError::AlreadyReturned);
    }

    if !tx.try_increment(book_id).await? {
        return Err(AppError::Internal(format!(
            "book {} missing from inventory",
            book_id
        )));
    }

    Ok(Loan {
        is_returned: true,
        ..loan
    })
}

/// Commit on success, roll back on failure
async fn finish<T>(
    tx: Box<dyn StoreTransaction>,
    result: AppResult<T>,
    request_id: &str,
    operation: &str,
    user_id: i64,
    book_id: Uuid,
) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(request_id, user_id, %book_id, "{}: commit failed: {}", operation, e);
                e
            })?;
            tracing::info!(request_id, user_id, %book_id, "{}: transaction committed", operation);
            Ok(value)
        }
        Err(err) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!(request_id, "{}: failed to roll back: {}", operation, rb);
            }
            match err.status_class() {
                StatusClass::Internal => {
                    tracing::error!(request_id, user_id, %book_id, "{} rolled back: {}", operation, err)
                }
                _ => tracing::warn!(request_id, user_id, %book_id, "{} rejected: {}", operation, err),
            }
            Err(err)
        }
    }
}
