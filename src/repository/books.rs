//! Books repository: title lookup, catalog seeding and the inventory counters

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{InventoryStore, PgTransaction};
use crate::{
    error::{AppError, AppResult},
    models::book::{normalize_title, BookDetail, CatalogEntry},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by title
    pub async fn get_by_title(&self, request_id: &str, title: &str) -> AppResult<BookDetail> {
        let title = normalize_title(title);
        sqlx::query_as::<_, BookDetail>(
            "SELECT id, title, available_copies FROM books WHERE title = $1",
        )
        .bind(&title)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            tracing::debug!(request_id, "No book titled '{}'", title);
            AppError::NotFound(format!("Book '{}' not found", title))
        })
    }

    /// Seed books in a single transaction, skipping duplicate titles
    pub async fn seed(&self, entries: &[CatalogEntry]) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for entry in entries {
            if entry.available_copies < 0 {
                return Err(AppError::Validation(format!(
                    "Book '{}' has a negative number of copies",
                    entry.title
                )));
            }

            let result = sqlx::query(
                r#"
                INSERT INTO books (id, title, available_copies, created_at, updated_at)
                VALUES ($1, $2, $3, NOW(), NOW())
                ON CONFLICT (title) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(normalize_title(&entry.title))
            .bind(entry.available_copies)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl InventoryStore for PgTransaction {
    async fn get_availability(&mut self, book_id: Uuid) -> AppResult<Option<i32>> {
        let copies = sqlx::query_scalar::<_, i32>("SELECT available_copies FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(copies)
    }

    async fn try_decrement(&mut self, book_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(book_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_increment(&mut self, book_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(book_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
