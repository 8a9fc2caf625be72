//! Book lookup endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::book::{BookDetail, BookRequest},
    AppState,
};

use super::RequestId;

/// Get a book and its available copies by title
#[utoipa::path(
    get,
    path = "/book",
    tag = "books",
    params(BookRequest),
    responses(
        (status = 200, description = "Book found", body = BookDetail),
        (status = 400, description = "Missing or too long title", body = crate::error::ErrorResponse),
        (status = 404, description = "No book with this title", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(query): Query<BookRequest>,
) -> AppResult<Json<BookDetail>> {
    let title = query.validated_title()?;

    let book = state
        .services
        .catalog
        .get_book_by_title(&request_id, &title)
        .await?;
    Ok(Json(book))
}
