//! HTTP API handlers for orgmap-ei

pub mod health;
pub mod import_workflow;
pub mod sse;

pub use health::health_routes;
pub use import_workflow::import_routes;
pub use sse::import_event_stream;
