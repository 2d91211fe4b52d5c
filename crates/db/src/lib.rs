pub mod repositories;

pub use repositories::{
    CustomerHistoryRepository, InMemoryProductRepository, InMemoryQuoteStore, ProductRepository,
    QuoteRepository, RepositoryError, RevisionRepository,
};
