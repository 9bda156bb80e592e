pub mod config;
pub mod domain;
pub mod errors;
pub mod events;

pub use domain::product::{NewProduct, Page, Product, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use events::{
    EventSeverity, EventSink, InMemoryEventSink, ProductEvent, ProductOperation, TracingEventSink,
};
