//! Core of the Web Annotation store.
//! Validation, target resolution and the target-closure engine live here;
//! transport layers only call into this crate.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::{AnnotationError, AnnotationResult, StatusClass};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::annotation::Annotation;
pub use model::collection::AnnotationCollection;
pub use model::kind::DocumentKind;
pub use model::record::{is_tombstone, Tombstone, TARGET_CLOSURE_FIELD, TARGET_CLOSURE_ID_PATH};
pub use model::target::{
    resolve_target_ids, resolve_target_info, Selector, Target, TargetDescriptor, TargetError,
    TypeLabels,
};
pub use model::validation::{is_iri, validate, ValidationError, ANNOTATION_CONTEXT};
pub use repo::document_store::{
    DocumentListQuery, DocumentPage, DocumentStore, StoreError, StoreResult,
};
pub use repo::memory_store::MemoryDocumentStore;
pub use repo::sqlite_store::SqliteDocumentStore;
pub use service::annotation_store::{AnnotationList, AnnotationStore};
pub use service::collections::CollectionList;
pub use service::import::{ImportError, ImportFailure, ImportSummary};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
