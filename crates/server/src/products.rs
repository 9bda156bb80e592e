//! Product REST routes.
//!
//! - `GET    /products`       first page of products (offset 0, limit 10)
//! - `GET    /products/{id}`  single product
//! - `POST   /products`       create; responds 201 with a `Location` header
//! - `PUT    /products/{id}`  replace description and price; body id must match
//! - `DELETE /products/{id}`  remove

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_core::domain::product::{NewProduct, Page, Product, ProductId};
use shopfront_core::errors::{ApplicationError, DomainError, InterfaceError};
use shopfront_db::repositories::{
    DeleteOutcome, ProductRepository, RepositoryError, UpdateOutcome,
};
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProductsState {
    repository: Arc<dyn ProductRepository>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    /// Absent ids deserialize as 0, which never matches a stored product.
    #[serde(default)]
    pub id: ProductId,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<ApplicationError> for ApiError {
    fn from(value: ApplicationError) -> Self {
        Self(value.into_interface(Uuid::new_v4().to_string()))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::from(value).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status.is_server_error() {
            error!(
                event_name = "product.request_failed",
                correlation_id = %self.0.correlation_id(),
                error = %self.0,
                "product request failed"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(repository: Arc<dyn ProductRepository>) -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product).put(update_product).delete(delete_product))
        .with_state(ProductsState { repository })
}

pub fn location_for(id: ProductId) -> String {
    format!("/products/{id}")
}

/// Always the first page; callers have no way to ask for later pages yet.
async fn list_products(
    State(state): State<ProductsState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.repository.list(Page::default()).await?;
    Ok(Json(products))
}

async fn get_product(
    Path(id): Path<i64>,
    State(state): State<ProductsState>,
) -> Result<Json<Product>, ApiError> {
    let id = ProductId(id);
    match state.repository.find_by_id(id).await? {
        Some(product) => Ok(Json(product)),
        None => Err(ApplicationError::NotFound(id).into()),
    }
}

async fn create_product(
    State(state): State<ProductsState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created =
        state.repository.create(NewProduct::new(request.description, request.price)).await?;

    Ok((StatusCode::CREATED, [(header::LOCATION, location_for(created.id))], Json(created)))
}

async fn update_product(
    Path(id): Path<i64>,
    State(state): State<ProductsState>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<StatusCode, ApiError> {
    let id = ProductId(id);
    let product =
        Product { id: request.id, description: request.description, price: request.price };

    match state.repository.update(id, product).await? {
        UpdateOutcome::Updated(_) => Ok(StatusCode::NO_CONTENT),
        UpdateOutcome::NotFound => Err(ApplicationError::NotFound(id).into()),
        UpdateOutcome::IdMismatch { path_id, body_id } => {
            Err(ApplicationError::from(DomainError::IdMismatch { path_id, body_id }).into())
        }
    }
}

async fn delete_product(
    Path(id): Path<i64>,
    State(state): State<ProductsState>,
) -> Result<StatusCode, ApiError> {
    let id = ProductId(id);
    match state.repository.delete(id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(ApplicationError::NotFound(id).into()),
    }
}
