//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn detail(&self) -> BookDetail {
        BookDetail {
            id: self.id,
            title: self.title.clone(),
            available_copies: self.available_copies,
        }
    }
}

/// Book as resolved by a title lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookDetail {
    pub id: Uuid,
    pub title: String,
    pub available_copies: i32,
}

/// Title carried by the book, borrow, extend and return requests
#[derive(Debug, Clone, Deserialize, Validate, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookRequest {
    /// Book title (case-insensitive)
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

impl BookRequest {
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Validate the request and return the normalized title.
    ///
    /// A title made only of whitespace is rejected like an empty one.
    pub fn validated_title(&self) -> AppResult<String> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let title = self.normalized_title();
        if title.is_empty() {
            return Err(AppError::Validation("title: must not be blank".to_string()));
        }
        Ok(title)
    }
}

/// One entry of the seed catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub available_copies: i32,
}

/// Titles are unique once trimmed and lower-cased
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}
