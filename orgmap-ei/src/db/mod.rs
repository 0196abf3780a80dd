//! Database access for orgmap-ei
//!
//! One module per table, free async functions over the shared pool. The
//! canonical store's merge operation lives in `employers`.

pub mod aliases;
pub mod capabilities;
pub mod employers;
pub mod pending;
pub mod settings;
