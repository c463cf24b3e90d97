//! Document store contract shared by all persistence backends.
//!
//! # Responsibility
//! - Define the narrow key/type-addressed persistence contract the
//!   annotation engine depends on.
//! - Define how documents are flattened for search-by-field.
//!
//! # Invariants
//! - Documents are addressed by `(kind, id)`; ids are unique per kind.
//! - Search paths are dotted object keys; arrays are transparent, so
//!   `targetClosure.id` matches the `id` of any closure entry.
//! - Reads may lag writes until `refresh()` is called (near-real-time
//!   visibility); `refresh()` makes every earlier write visible.

use crate::db::DbError;
use crate::model::kind::DocumentKind;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound { kind: DocumentKind, id: String },
    Serialization(serde_json::Error),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found in store: {id}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Paged listing of one document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentListQuery {
    pub kind: DocumentKind,
    /// Whether tombstoned documents are listed too.
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl DocumentListQuery {
    /// Lists every active document of `kind`.
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            include_deleted: false,
            limit: None,
            offset: 0,
        }
    }
}

/// One page of listed documents.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPage {
    /// Number of matching documents across all pages.
    pub total: u64,
    /// Documents of this page, ordered by id.
    pub documents: Vec<Value>,
}

/// Persistence contract for JSON documents.
pub trait DocumentStore {
    fn exists(&self, kind: DocumentKind, id: &str) -> StoreResult<bool>;
    /// Fails with `NotFound` when absent.
    fn get(&self, kind: DocumentKind, id: &str) -> StoreResult<Value>;
    /// Inserts or replaces a document.
    fn put(&self, kind: DocumentKind, id: &str, document: &Value) -> StoreResult<()>;
    /// Fails with `NotFound` when absent.
    fn delete(&self, kind: DocumentKind, id: &str) -> StoreResult<()>;
    /// Documents of `kind` holding `value` at `field_path`, ordered by id.
    fn search_by_field(
        &self,
        kind: DocumentKind,
        field_path: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>>;
    /// Makes all earlier writes visible to subsequent reads and searches.
    fn refresh(&self) -> StoreResult<()>;
    fn list(&self, query: &DocumentListQuery) -> StoreResult<DocumentPage>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn exists(&self, kind: DocumentKind, id: &str) -> StoreResult<bool> {
        (**self).exists(kind, id)
    }

    fn get(&self, kind: DocumentKind, id: &str) -> StoreResult<Value> {
        (**self).get(kind, id)
    }

    fn put(&self, kind: DocumentKind, id: &str, document: &Value) -> StoreResult<()> {
        (**self).put(kind, id, document)
    }

    fn delete(&self, kind: DocumentKind, id: &str) -> StoreResult<()> {
        (**self).delete(kind, id)
    }

    fn search_by_field(
        &self,
        kind: DocumentKind,
        field_path: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>> {
        (**self).search_by_field(kind, field_path, value)
    }

    fn refresh(&self) -> StoreResult<()> {
        (**self).refresh()
    }

    fn list(&self, query: &DocumentListQuery) -> StoreResult<DocumentPage> {
        (**self).list(query)
    }
}

/// Flattens scalar leaves of a document into `(dotted path, text)` pairs.
///
/// Array elements share their parent's path; `null` leaves are skipped.
pub fn indexed_fields(document: &Value) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), document)];
    while let Some((path, value)) = stack.pop() {
        match value {
            Value::Null => {}
            Value::String(text) => fields.push((path, text.clone())),
            Value::Bool(_) | Value::Number(_) => fields.push((path, value.to_string())),
            Value::Array(items) => {
                stack.extend(items.iter().rev().map(|item| (path.clone(), item)));
            }
            Value::Object(object) => {
                stack.extend(object.iter().rev().map(|(key, item)| {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    (child, item)
                }));
            }
        }
    }
    fields
}
