//! Loan management endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{book::BookRequest, loan::LoanDetail},
    AppState,
};

use super::{AuthenticatedUser, RequestId};

/// Return response with loan details
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// Loan details
    pub loan: LoanDetail,
}

/// Get the caller's active loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's active loans", body = Vec<LoanDetail>),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetail>>> {
    let loans = state.services.loans.get_user_loans(user.id).await?;
    Ok(Json(loans))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BookRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanDetail),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already borrowed or no copies left", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<BookRequest>,
) -> AppResult<(StatusCode, Json<LoanDetail>)> {
    let title = request.validated_title()?;

    let loan = state
        .services
        .loans
        .borrow_book_by_title(&request_id, &user, &title)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Extend the due date of a borrowed book
#[utoipa::path(
    post,
    path = "/extend",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Loan extended", body = LoanDetail),
        (status = 404, description = "Book or active loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan already extended", body = crate::error::ErrorResponse)
    )
)]
pub async fn extend_book_loan(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<BookRequest>,
) -> AppResult<Json<LoanDetail>> {
    let title = request.validated_title()?;

    let loan = state
        .services
        .loans
        .extend_book_loan_by_title(&request_id, user.id, &title)
        .await?;

    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Book or active loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<BookRequest>,
) -> AppResult<Json<ReturnResponse>> {
    let title = request.validated_title()?;

    let loan = state
        .services
        .loans
        .return_book_by_title(&request_id, user.id, &title)
        .await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        loan,
    }))
}
