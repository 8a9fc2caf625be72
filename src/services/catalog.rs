//! Catalog service: title lookup and startup seeding

use std::path::Path;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::book::{BookDetail, CatalogEntry},
    repository::{BookLookup, LoanStore},
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LoanStore>,
    lookup: Arc<dyn BookLookup>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LoanStore>, lookup: Arc<dyn BookLookup>) -> Self {
        Self { store, lookup }
    }

    /// Get a book and its current availability by title
    pub async fn get_book_by_title(&self, request_id: &str, title: &str) -> AppResult<BookDetail> {
        self.lookup.get_book(request_id, title).await
    }

    /// Seed the inventory from a JSON catalog file
    pub async fn seed_from_file(&self, path: impl AsRef<Path>) -> AppResult<u64> {
        let path = path.as_ref();
        let entries = load_catalog(path).await?;
        let inserted = self.store.seed_books(&entries).await?;
        tracing::info!(
            "Seeded {} new book(s) from {} ({} in catalog)",
            inserted,
            path.display(),
            entries.len()
        );
        Ok(inserted)
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}

/// Read a catalog file: a JSON array of `{title, available_copies}`
pub async fn load_catalog(path: &Path) -> AppResult<Vec<CatalogEntry>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Internal(format!("Failed to read catalog {}: {}", path.display(), e))
    })?;
    parse_catalog(&content)
}

fn parse_catalog(content: &str) -> AppResult<Vec<CatalogEntry>> {
    serde_json::from_str(content)
        .map_err(|e| AppError::Validation(format!("Invalid catalog file: {}", e)))
}
