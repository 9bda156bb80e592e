use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::Row;

use shopfront_core::domain::product::{NewProduct, Page, Product, ProductId};
use shopfront_core::events::{EventSink, ProductEvent, ProductOperation};

use super::{DeleteOutcome, ProductRepository, RepositoryError, UpdateOutcome};
use crate::connection::ConnectionProvider;

/// Hand-written SQL over the `products` table.
///
/// Every call checks out its own connection from the provider and runs exactly
/// one statement on it. The connection, and any statement or cursor bound to it,
/// is released when the call returns, on the error path included.
pub struct SqlProductRepository {
    connections: Arc<dyn ConnectionProvider>,
    events: Arc<dyn EventSink>,
}

impl SqlProductRepository {
    pub fn new(connections: Arc<dyn ConnectionProvider>, events: Arc<dyn EventSink>) -> Self {
        Self { connections, events }
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product { id: ProductId(id), description, price: parse_price(id, &price_str)? })
}

// Columns declared DECIMAL/NUMERIC keep prices as REAL or INTEGER, so the selects cast to
// TEXT. Large REALs render in exponent form.
fn parse_price(id: i64, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).or_else(|_| Decimal::from_scientific(value)).map_err(|error| {
        RepositoryError::Decode(format!("product {id} has unreadable price `{value}`: {error}"))
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list(&self, page: Page) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.connections.acquire().await?;

        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, description, CAST(price AS TEXT) AS price
             FROM products
             ORDER BY id ASC
             LIMIT ? OFFSET ?",
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *conn)
        .await?;

        let products = rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()?;
        self.events.info(ProductEvent::Listed { page, count: products.len() });
        Ok(products)
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.connections.acquire().await?;

        let row = sqlx::query(
            "SELECT id, description, CAST(price AS TEXT) AS price
             FROM products
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(ref r) => {
                let product = row_to_product(r)?;
                self.events.info(ProductEvent::Retrieved(product.clone()));
                Ok(Some(product))
            }
            None => {
                self.events.warn(ProductEvent::NotFound { operation: ProductOperation::Get, id });
                Ok(None)
            }
        }
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut conn = self.connections.acquire().await?;

        // RETURNING reads the rowid produced by this statement on this connection.
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (description, price)
             VALUES (?, ?)
             RETURNING id",
        )
        .bind(&product.description)
        .bind(product.price.to_string())
        .fetch_one(&mut *conn)
        .await?;

        let created = product.with_id(ProductId(id));
        self.events.info(ProductEvent::Created(created.clone()));
        Ok(created)
    }

    async fn update(
        &self,
        id: ProductId,
        product: Product,
    ) -> Result<UpdateOutcome, RepositoryError> {
        if product.id != id {
            self.events.warn(ProductEvent::IdMismatch { path_id: id, body_id: product.id });
            return Ok(UpdateOutcome::IdMismatch { path_id: id, body_id: product.id });
        }

        let mut conn = self.connections.acquire().await?;

        let result = sqlx::query(
            "UPDATE products
             SET description = ?, price = ?
             WHERE id = ?",
        )
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            self.events.warn(ProductEvent::NotFound { operation: ProductOperation::Update, id });
            return Ok(UpdateOutcome::NotFound);
        }

        self.events.info(ProductEvent::Updated(product.clone()));
        Ok(UpdateOutcome::Updated(product))
    }

    async fn delete(&self, id: ProductId) -> Result<DeleteOutcome, RepositoryError> {
        let mut conn = self.connections.acquire().await?;

        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id.0)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            self.events.warn(ProductEvent::NotFound { operation: ProductOperation::Delete, id });
            return Ok(DeleteOutcome::NotFound);
        }

        self.events.info(ProductEvent::Deleted { id });
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use shopfront_core::domain::product::{NewProduct, Page, Product, ProductId};
    use shopfront_core::events::{EventSeverity, InMemoryEventSink, ProductEvent, ProductOperation};

    use super::SqlProductRepository;
    use crate::repositories::{DeleteOutcome, ProductRepository, RepositoryError, UpdateOutcome};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, SqlProductRepository, InMemoryEventSink) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let events = InMemoryEventSink::default();
        let repo = SqlProductRepository::new(Arc::new(pool.clone()), Arc::new(events.clone()));
        (pool, repo, events)
    }

    fn widget() -> NewProduct {
        NewProduct::new("Widget", Decimal::new(999, 2))
    }

    #[tokio::test]
    async fn create_assigns_store_id_and_keeps_caller_fields() {
        let (_pool, repo, events) = setup().await;

        let created = repo.create(widget()).await.expect("create");

        assert!(created.id.0 > 0);
        assert_eq!(created.description, "Widget");
        assert_eq!(created.price, Decimal::new(999, 2));
        assert_eq!(events.last(), Some((EventSeverity::Info, ProductEvent::Created(created))));
    }

    #[tokio::test]
    async fn create_never_reuses_an_id() {
        let (_pool, repo, _events) = setup().await;

        let first = repo.create(widget()).await.expect("first");
        repo.delete(first.id).await.expect("delete first");

        let mut seen = HashSet::from([first.id]);
        for n in 0..5 {
            let created = repo
                .create(NewProduct::new(format!("Item {n}"), Decimal::new(100 + n, 2)))
                .await
                .expect("create");
            assert!(seen.insert(created.id), "id {} was handed out twice", created.id);
        }
    }

    #[tokio::test]
    async fn find_by_id_returns_last_written_fields() {
        let (_pool, repo, events) = setup().await;
        let created = repo.create(widget()).await.expect("create");

        let found = repo.find_by_id(created.id).await.expect("find");

        assert_eq!(found.as_ref(), Some(&created));
        assert_eq!(events.last(), Some((EventSeverity::Info, ProductEvent::Retrieved(created))));
    }

    #[tokio::test]
    async fn find_by_id_for_unknown_id_is_not_found_with_warning() {
        let (_pool, repo, events) = setup().await;

        let found = repo.find_by_id(ProductId(404)).await.expect("find");

        assert_eq!(found, None);
        assert_eq!(
            events.last(),
            Some((
                EventSeverity::Warning,
                ProductEvent::NotFound { operation: ProductOperation::Get, id: ProductId(404) }
            ))
        );
    }

    #[tokio::test]
    async fn list_on_empty_table_is_empty_not_error() {
        let (_pool, repo, events) = setup().await;

        let products = repo.list(Page::default()).await.expect("list");

        assert!(products.is_empty());
        assert_eq!(
            events.last(),
            Some((EventSeverity::Info, ProductEvent::Listed { page: Page::default(), count: 0 }))
        );
    }

    #[tokio::test]
    async fn list_returns_first_ten_in_ascending_id_order() {
        let (_pool, repo, _events) = setup().await;
        for n in 0..12 {
            repo.create(NewProduct::new(format!("Item {n}"), Decimal::new(n, 0)))
                .await
                .expect("create");
        }

        let products = repo.list(Page::default()).await.expect("list");

        assert_eq!(products.len(), 10);
        assert!(products.windows(2).all(|pair| pair[0].id < pair[1].id));
        assert_eq!(products[0].description, "Item 0");
    }

    #[tokio::test]
    async fn list_honours_offset_and_limit() {
        let (_pool, repo, _events) = setup().await;
        let mut ids = Vec::new();
        for n in 0..6 {
            ids.push(
                repo.create(NewProduct::new(format!("Item {n}"), Decimal::ONE))
                    .await
                    .expect("create")
                    .id,
            );
        }

        let page = repo.list(Page::new(2, 3)).await.expect("list");

        assert_eq!(page.iter().map(|p| p.id).collect::<Vec<_>>(), ids[2..5].to_vec());

        let past_end = repo.list(Page::new(10, 3)).await.expect("list past end");
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn list_binds_page_values_instead_of_interpolating() {
        let (pool, repo, _events) = setup().await;
        repo.create(widget()).await.expect("create");

        // u32 parameters cannot carry SQL, so the page is the only input to the query.
        let products = repo.list(Page::new(0, u32::MAX)).await.expect("list");
        assert_eq!(products.len(), 1);

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM products").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn update_writes_new_fields_in_place() {
        let (_pool, repo, events) = setup().await;
        let created = repo.create(widget()).await.expect("create");
        let changed = Product {
            id: created.id,
            description: "Widget v2".to_string(),
            price: Decimal::new(1250, 2),
        };

        let outcome = repo.update(created.id, changed.clone()).await.expect("update");

        assert_eq!(outcome, UpdateOutcome::Updated(changed.clone()));
        assert_eq!(
            events.last(),
            Some((EventSeverity::Info, ProductEvent::Updated(changed.clone())))
        );
        let found = repo.find_by_id(created.id).await.expect("find");
        assert_eq!(found, Some(changed));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let (_pool, repo, events) = setup().await;
        let ghost =
            Product { id: ProductId(99), description: "Ghost".to_string(), price: Decimal::ONE };

        let outcome = repo.update(ProductId(99), ghost).await.expect("update");

        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert_eq!(
            events.last(),
            Some((
                EventSeverity::Warning,
                ProductEvent::NotFound { operation: ProductOperation::Update, id: ProductId(99) }
            ))
        );
    }

    #[tokio::test]
    async fn update_id_mismatch_is_rejected_before_touching_the_store() {
        let (pool, repo, events) = setup().await;
        let created = repo.create(widget()).await.expect("create");
        pool.close().await;

        let body = Product { id: ProductId(created.id.0 + 1), ..created.clone() };
        let outcome = repo.update(created.id, body).await.expect("mismatch needs no connection");

        assert_eq!(
            outcome,
            UpdateOutcome::IdMismatch { path_id: created.id, body_id: ProductId(created.id.0 + 1) }
        );
        assert_eq!(events.last().map(|(severity, _)| severity), Some(EventSeverity::Warning));
    }

    #[tokio::test]
    async fn delete_then_find_is_not_found() {
        let (_pool, repo, events) = setup().await;
        let created = repo.create(widget()).await.expect("create");

        let outcome = repo.delete(created.id).await.expect("delete");
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(
            events.last(),
            Some((EventSeverity::Info, ProductEvent::Deleted { id: created.id }))
        );

        assert_eq!(repo.find_by_id(created.id).await.expect("find"), None);
        assert_eq!(repo.delete(created.id).await.expect("second delete"), DeleteOutcome::NotFound);
        assert_eq!(
            events.last(),
            Some((
                EventSeverity::Warning,
                ProductEvent::NotFound { operation: ProductOperation::Delete, id: created.id }
            ))
        );
    }

    #[tokio::test]
    async fn store_failures_surface_as_errors_without_events() {
        let (pool, repo, events) = setup().await;
        pool.close().await;
        let before = events.events().len();

        let result = repo.find_by_id(ProductId(1)).await;

        assert!(matches!(result, Err(RepositoryError::Database(_))));
        assert_eq!(events.events().len(), before);
    }

    #[tokio::test]
    async fn unreadable_price_is_a_decode_error() {
        let (pool, repo, _events) = setup().await;
        sqlx::query("INSERT INTO products (id, description, price) VALUES (5, 'Broken', 'n/a')")
            .execute(&pool)
            .await
            .expect("seed broken row");

        let result = repo.find_by_id(ProductId(5)).await;

        assert!(matches!(
            result,
            Err(RepositoryError::Decode(ref message)) if message.contains("n/a")
        ));
    }

    #[tokio::test]
    async fn decimal_price_column_round_trips_through_numeric_affinity() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        sqlx::query(
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                price DECIMAL(10,2) NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .expect("create decimal table");
        let events = InMemoryEventSink::default();
        let repo = SqlProductRepository::new(Arc::new(pool.clone()), Arc::new(events));

        let created = repo.create(widget()).await.expect("create");
        let (stored_type,): (String,) = sqlx::query_as("SELECT typeof(price) FROM products")
            .fetch_one(&pool)
            .await
            .expect("storage class");
        assert_eq!(stored_type, "real");

        assert_eq!(repo.find_by_id(created.id).await.expect("find"), Some(created.clone()));

        let whole = Product {
            description: "Widget v2".to_string(),
            price: Decimal::new(1000, 2),
            ..created
        };
        repo.update(whole.id, whole.clone()).await.expect("update");

        let listed = repo.list(Page::default()).await.expect("list");
        assert_eq!(listed, vec![whole]);
    }

    #[tokio::test]
    async fn connection_is_returned_after_each_call() {
        let (pool, repo, _events) = setup().await;

        // A single-connection pool would time out on the second call if the first leaked.
        for _ in 0..3 {
            repo.create(widget()).await.expect("create");
            let _ = repo.find_by_id(ProductId(999)).await.expect("find");
        }
        assert_eq!(pool.size(), 1);
    }
}
