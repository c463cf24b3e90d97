//! Document store contract and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contract consumed by the annotation engine.
//! - Keep SQL and in-memory details out of service orchestration.
//!
//! # Invariants
//! - Stores never interpret documents beyond the tombstone marker and the
//!   flattened search fields.
//! - Store APIs return semantic `NotFound` errors in addition to transport
//!   errors.

pub mod document_store;
pub mod memory_store;
pub mod sqlite_store;
