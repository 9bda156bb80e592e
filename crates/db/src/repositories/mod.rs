use async_trait::async_trait;
use thiserror::Error;

use shopfront_core::domain::product::{NewProduct, Page, Product, ProductId};
use shopfront_core::errors::ApplicationError;

pub mod product;

pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Product),
    NotFound,
    /// The path id and the body id disagree; nothing was sent to the store.
    IdMismatch { path_id: ProductId, body_id: ProductId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self, page: Page) -> Result<Vec<Product>, RepositoryError>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// `product.id` must equal `id`; a mismatch is reported without touching the store.
    async fn update(
        &self,
        id: ProductId,
        product: Product,
    ) -> Result<UpdateOutcome, RepositoryError>;

    async fn delete(&self, id: ProductId) -> Result<DeleteOutcome, RepositoryError>;
}
