//! Error types for the e-lib server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Name of the partial unique index guarding one active loan per (user, book)
pub const ACTIVE_LOAN_INDEX: &str = "loans_one_active_per_user_book";

/// Stable numeric error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchBook = 4,
    NoActiveLoan = 5,
    BadValue = 6,
    AlreadyBorrowed = 7,
    AlreadyExtended = 8,
    AlreadyReturned = 9,
    OutOfStock = 10,
    Timeout = 11,
}

/// Coarse classification of an error, independent of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    Internal,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("User has already borrowed this book")]
    AlreadyBorrowed,

    #[error("User has already borrowed and extended this book")]
    AlreadyExtended,

    #[error("Loan has already been returned")]
    AlreadyReturned,

    #[error("Book '{0}' is out of stock")]
    OutOfStock(String),

    #[error("No active loan found for this user and book")]
    NoActiveLoan,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // A racing insert that slipped past the active-loan read is still a double borrow.
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
                && db_err.constraint() == Some(ACTIVE_LOAN_INDEX)
            {
                return AppError::AlreadyBorrowed;
            }
        }
        AppError::Database(err)
    }
}

impl AppError {
    /// Status class of this error, used by callers to decide whether to retry
    pub fn status_class(&self) -> StatusClass {
        match self {
            AppError::Authentication(_) => StatusClass::Unauthorized,
            AppError::NotFound(_) | AppError::NoActiveLoan => StatusClass::NotFound,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusClass::BadRequest,
            AppError::AlreadyBorrowed
            | AppError::AlreadyExtended
            | AppError::AlreadyReturned
            | AppError::OutOfStock(_) => StatusClass::Conflict,
            AppError::Database(_) | AppError::Timeout(_) | AppError::Internal(_) => {
                StatusClass::Internal
            }
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) => ErrorCode::NotAuthorized,
            AppError::NotFound(_) => ErrorCode::NoSuchBook,
            AppError::NoActiveLoan => ErrorCode::NoActiveLoan,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorCode::BadValue,
            AppError::AlreadyBorrowed => ErrorCode::AlreadyBorrowed,
            AppError::AlreadyExtended => ErrorCode::AlreadyExtended,
            AppError::AlreadyReturned => ErrorCode::AlreadyReturned,
            AppError::OutOfStock(_) => ErrorCode::OutOfStock,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Timeout(_) => ErrorCode::Timeout,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            other => {
                let status = match other.status_class() {
                    StatusClass::BadRequest => StatusCode::BAD_REQUEST,
                    StatusClass::Unauthorized => StatusCode::UNAUTHORIZED,
                    StatusClass::NotFound => StatusCode::NOT_FOUND,
                    StatusClass::Conflict => StatusCode::CONFLICT,
                    StatusClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, other.to_string())
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
