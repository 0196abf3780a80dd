//! # Orgmap Common Library
//!
//! Shared code for orgmap services including:
//! - Database pool initialization and schema
//! - Event types (OrgmapEvent enum) and EventBus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
