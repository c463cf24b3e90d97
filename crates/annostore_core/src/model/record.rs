//! Stored-record conventions shared by annotations and collections.
//!
//! # Invariants
//! - A tombstone keeps only `{id, type, status: "deleted"}` and is terminal.
//! - `targetClosure` is an internal field; it never leaves the store layer.

use crate::model::kind::DocumentKind;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

/// Internal field holding the denormalized transitive target closure.
pub const TARGET_CLOSURE_FIELD: &str = "targetClosure";
/// Dotted search path matching any closure entry id.
pub const TARGET_CLOSURE_ID_PATH: &str = "targetClosure.id";
/// `status` value marking a tombstoned record.
pub const STATUS_DELETED: &str = "deleted";

/// Terminal record left in place of a deleted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub id: String,
    pub kind: DocumentKind,
}

impl Tombstone {
    pub fn new(id: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn to_document(&self) -> Value {
        json!({
            "id": self.id,
            "type": self.kind.as_str(),
            "status": STATUS_DELETED,
        })
    }
}

/// Returns whether a stored document is a tombstone.
pub fn is_tombstone(document: &Value) -> bool {
    document.get("status").and_then(Value::as_str) == Some(STATUS_DELETED)
}

/// Generates a fresh document IRI (`urn:uuid:<v4>`).
pub(crate) fn new_document_id() -> String {
    Uuid::new_v4().urn().to_string()
}

/// Current UTC time as an RFC 3339 timestamp.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
