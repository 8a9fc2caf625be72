//! Loans repository: the loan ledger

use async_trait::async_trait;
use chrono::Duration;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{LoanLedger, PgTransaction};
use crate::{
    error::AppResult,
    models::loan::{Loan, LoanDetail, NewLoan},
};

const LOAN_COLUMNS: &str =
    "id, user_id, book_id, borrower_name, loan_date, return_date, is_returned, is_extended";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get active loans for a user
    pub async fn get_user_loans(&self, user_id: i64) -> AppResult<Vec<LoanDetail>> {
        let loans = sqlx::query_as::<_, LoanDetail>(
            r#"
            SELECT b.title AS book_title, l.borrower_name AS name_of_borrower,
                   l.loan_date, l.return_date
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1 AND l.is_returned = FALSE
            ORDER BY l.loan_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}

#[async_trait]
impl LoanLedger for PgTransaction {
    async fn find_active_loan(&mut self, user_id: i64, book_id: Uuid) -> AppResult<Option<Loan>> {
        // Row lock serialises extend/return racing on the same loan.
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE user_id = $1 AND book_id = $2 AND is_returned = FALSE FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(loan)
    }

    async fn get_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(loan)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (id, user_id, book_id, borrower_name, loan_date, return_date,
                               is_returned, is_extended)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, FALSE)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(&loan.borrower_name)
        .bind(loan.loan_date)
        .bind(loan.return_date)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(loan)
    }

    async fn try_mark_extended(&mut self, loan_id: Uuid, extension: Duration) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET return_date = return_date + $2, is_extended = TRUE
            WHERE id = $1 AND is_returned = FALSE AND is_extended = FALSE
            "#,
        )
        .bind(loan_id)
        .bind(extension)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_mark_returned(&mut self, loan_id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE loans SET is_returned = TRUE WHERE id = $1 AND is_returned = FALSE")
                .bind(loan_id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() == 1)
    }
}
