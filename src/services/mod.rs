//! Business logic services

pub mod catalog;
pub mod loans;

use std::sync::Arc;

use crate::{
    config::LoansConfig,
    repository::{BookLookup, LoanStore},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services over the given store and book lookup
    pub fn new(
        store: Arc<dyn LoanStore>,
        lookup: Arc<dyn BookLookup>,
        loans_config: LoansConfig,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone(), lookup.clone()),
            loans: loans::LoansService::new(store, lookup, loans_config),
        }
    }
}
