use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::product::{Page, Product, ProductId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductOperation {
    Get,
    Update,
    Delete,
}

impl ProductOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Structured outcome of a repository call, handed to an [`EventSink`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    Listed { page: Page, count: usize },
    Retrieved(Product),
    Created(Product),
    Updated(Product),
    Deleted { id: ProductId },
    NotFound { operation: ProductOperation, id: ProductId },
    IdMismatch { path_id: ProductId, body_id: ProductId },
}

impl ProductEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Listed { .. } => "product.listed",
            Self::Retrieved(_) => "product.retrieved",
            Self::Created(_) => "product.created",
            Self::Updated(_) => "product.updated",
            Self::Deleted { .. } => "product.deleted",
            Self::NotFound { .. } => "product.not_found",
            Self::IdMismatch { .. } => "product.id_mismatch",
        }
    }

    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Retrieved(product) | Self::Created(product) | Self::Updated(product) => {
                Some(product.id)
            }
            Self::Deleted { id } | Self::NotFound { id, .. } => Some(*id),
            Self::IdMismatch { path_id, .. } => Some(*path_id),
            Self::Listed { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
}

pub trait EventSink: Send + Sync {
    fn info(&self, event: ProductEvent);
    fn warn(&self, event: ProductEvent);
}

// Expands to one `tracing::$level!` call per variant so each event keeps its own fields.
macro_rules! log_product_event {
    ($level:ident, $event:expr) => {{
        let event: &ProductEvent = $event;
        let event_name = event.event_name();
        match event {
            ProductEvent::Listed { page, count } => tracing::$level!(
                event_name,
                offset = page.offset,
                limit = page.limit,
                count = *count,
                "fetched products page"
            ),
            ProductEvent::Retrieved(product)
            | ProductEvent::Created(product)
            | ProductEvent::Updated(product) => tracing::$level!(
                event_name,
                product_id = product.id.0,
                description = %product.description,
                price = %product.price,
                "product {}",
                verb(event)
            ),
            ProductEvent::Deleted { id } => {
                tracing::$level!(event_name, product_id = id.0, "deleted product")
            }
            ProductEvent::NotFound { operation, id } => tracing::$level!(
                event_name,
                operation = operation.as_str(),
                product_id = id.0,
                "product not found"
            ),
            ProductEvent::IdMismatch { path_id, body_id } => tracing::$level!(
                event_name,
                path_id = path_id.0,
                body_id = body_id.0,
                "product id in path does not match body"
            ),
        }
    }};
}

/// Forwards events to `tracing` using the `event_name` field convention, at the
/// severity the caller chose.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn info(&self, event: ProductEvent) {
        log_product_event!(info, &event);
    }

    fn warn(&self, event: ProductEvent) {
        log_product_event!(warn, &event);
    }
}

fn verb(event: &ProductEvent) -> &'static str {
    match event {
        ProductEvent::Retrieved(_) => "retrieved",
        ProductEvent::Created(_) => "created",
        ProductEvent::Updated(_) => "updated",
        _ => "changed",
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<(EventSeverity, ProductEvent)>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<(EventSeverity, ProductEvent)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<(EventSeverity, ProductEvent)> {
        self.events().pop()
    }

    fn record(&self, severity: EventSeverity, event: ProductEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push((severity, event)),
            Err(poisoned) => poisoned.into_inner().push((severity, event)),
        }
    }
}

impl EventSink for InMemoryEventSink {
    fn info(&self, event: ProductEvent) {
        self.record(EventSeverity::Info, event);
    }

    fn warn(&self, event: ProductEvent) {
        self.record(EventSeverity::Warning, event);
    }
}
