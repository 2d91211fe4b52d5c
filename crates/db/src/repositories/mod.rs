use async_trait::async_trait;
use thiserror::Error;

use landquote_core::approvals::DeletionPlan;
use landquote_core::domain::customer::{CustomerHistory, CustomerId};
use landquote_core::domain::product::CatalogEntry;
use landquote_core::domain::quote::{Quote, QuoteId};
use landquote_core::domain::revision::QuoteRevision;
use landquote_core::errors::{ApplicationError, CoreError};

pub mod memory;

pub use memory::{InMemoryProductRepository, InMemoryQuoteStore};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity, id } => {
                ApplicationError::Core(CoreError::not_found(entity, id))
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Quote>, RepositoryError>;

    /// Removes a quote with its lines and revision history, children first.
    async fn delete(&self, id: &QuoteId) -> Result<DeletionPlan, RepositoryError>;

    /// Quote ids from the root revision down to `id`, following parent links.
    async fn lineage(&self, id: &QuoteId) -> Result<Vec<QuoteId>, RepositoryError>;
}

#[async_trait]
pub trait RevisionRepository: Send + Sync {
    async fn append(&self, revision: QuoteRevision) -> Result<(), RepositoryError>;
    async fn list_for_quote(&self, quote_id: &QuoteId)
        -> Result<Vec<QuoteRevision>, RepositoryError>;
}

#[async_trait]
pub trait CustomerHistoryRepository: Send + Sync {
    async fn history_for(&self, customer_id: &CustomerId)
        -> Result<CustomerHistory, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_part_number(
        &self,
        part_number: &str,
    ) -> Result<Option<CatalogEntry>, RepositoryError>;
    async fn save(&self, entry: CatalogEntry) -> Result<(), RepositoryError>;

    /// Point-in-time copy usable as a synchronous `ProductCatalog`.
    async fn snapshot(&self) -> Result<Vec<CatalogEntry>, RepositoryError>;
}
