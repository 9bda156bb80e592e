pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, ConnectionProvider, DbConnection, DbPool};
pub use repositories::{
    DeleteOutcome, ProductRepository, RepositoryError, SqlProductRepository, UpdateOutcome,
};
