//! Loan model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::UserIdentity;

/// Loan row from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: i64,
    pub book_id: Uuid,
    pub borrower_name: String,
    pub loan_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
    pub is_returned: bool,
    pub is_extended: bool,
}

/// Lifecycle of a single loan.
///
/// `Active -> Extended -> Returned` or `Active -> Returned`. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanStatus {
    Active,
    Extended,
    Returned,
}

impl LoanStatus {
    pub fn can_extend(self) -> bool {
        self == LoanStatus::Active
    }

    pub fn can_return(self) -> bool {
        self != LoanStatus::Returned
    }
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        match (self.is_returned, self.is_extended) {
            (true, _) => LoanStatus::Returned,
            (false, true) => LoanStatus::Extended,
            (false, false) => LoanStatus::Active,
        }
    }

    pub fn detail(&self, book_title: &str) -> LoanDetail {
        LoanDetail {
            book_title: book_title.to_string(),
            name_of_borrower: self.borrower_name.clone(),
            loan_date: self.loan_date,
            return_date: self.return_date,
        }
    }
}

/// Loan about to be inserted in the ledger
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: i64,
    pub book_id: Uuid,
    pub borrower_name: String,
    pub loan_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
}

impl NewLoan {
    /// Loan starting now and due after `period`
    pub fn starting_now(user: &UserIdentity, book_id: Uuid, period: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id: user.id,
            book_id,
            borrower_name: user.name.clone(),
            loan_date: now,
            return_date: now + period,
        }
    }
}

/// Loan as returned to API clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetail {
    pub book_title: String,
    pub name_of_borrower: String,
    pub loan_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
}
