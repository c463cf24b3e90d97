//! Annotation store use-cases.
//!
//! # Responsibility
//! - Orchestrate entities and the document store into store-level APIs.
//! - Keep the target-graph engine, collections and bulk import on one
//!   `AnnotationStore` facade.

pub mod annotation_store;
pub mod collections;
pub mod import;
pub mod target_graph;
