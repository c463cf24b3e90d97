//! Annotation entity.
//!
//! # Responsibility
//! - Wrap a validated annotation document with its parsed targets.
//! - Assign identity and timestamps, and enforce update identity rules.
//! - Encode/decode the stored form (document + permissions + closure).
//!
//! # Invariants
//! - `id` never changes for the lifetime of an entity.
//! - `created` is set once; `modified` is refreshed on every update.
//! - `permissions` are carried opaquely and never interpreted.
//! - The in-memory document never holds `permissions` or `targetClosure`.

use crate::error::{AnnotationError, AnnotationResult};
use crate::model::kind::DocumentKind;
use crate::model::record::{new_document_id, now_timestamp, TARGET_CLOSURE_FIELD};
use crate::model::target::{parse_targets, Target, TargetDescriptor};
use crate::model::validation::{validate, ValidationError};
use serde_json::{Map, Value};

const PERMISSIONS_FIELD: &str = "permissions";

/// Validated annotation with parsed targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    id: String,
    document: Map<String, Value>,
    targets: Vec<Target>,
    permissions: Option<Value>,
}

impl Annotation {
    /// Builds an annotation from an inbound document.
    ///
    /// Assigns `id` (`urn:uuid:<v4>`) and `created` when absent.
    ///
    /// # Errors
    /// - `Validation` when the document is not a structurally valid annotation.
    /// - `InvalidTarget` when a target cannot be resolved.
    pub fn new(document: Value) -> AnnotationResult<Self> {
        let Value::Object(mut object) = document else {
            return Err(ValidationError::NotAnObject.into());
        };
        object
            .entry("id")
            .or_insert_with(|| Value::String(new_document_id()));
        object
            .entry("created")
            .or_insert_with(|| Value::String(now_timestamp()));
        Self::from_object(object)
    }

    /// Decodes a stored record into the entity and its stored closure.
    ///
    /// # Errors
    /// - `InvalidData` when the record is not a valid annotation, which
    ///   includes tombstones.
    pub fn from_stored(stored: Value) -> AnnotationResult<(Self, Vec<TargetDescriptor>)> {
        let Value::Object(mut object) = stored else {
            return Err(AnnotationError::InvalidData(
                "stored annotation is not an object".to_string(),
            ));
        };
        let closure = match object.remove(TARGET_CLOSURE_FIELD) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value).map_err(|err| {
                AnnotationError::InvalidData(format!("invalid {TARGET_CLOSURE_FIELD}: {err}"))
            })?,
        };
        if !object.get("id").is_some_and(Value::is_string) {
            return Err(AnnotationError::InvalidData(
                "stored annotation has no id".to_string(),
            ));
        }
        let annotation = Self::from_object(object)
            .map_err(|err| AnnotationError::InvalidData(format!("stored annotation: {err}")))?;
        Ok((annotation, closure))
    }

    fn from_object(mut object: Map<String, Value>) -> AnnotationResult<Self> {
        let permissions = object.remove(PERMISSIONS_FIELD);
        object.remove(TARGET_CLOSURE_FIELD);
        let document = Value::Object(object);
        validate(&document, Some(DocumentKind::Annotation))?;

        let Value::Object(object) = document else {
            return Err(ValidationError::NotAnObject.into());
        };
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ValidationError::IdNotString)?;
        let targets = parse_targets(object.get("target").unwrap_or(&Value::Null))?;

        Ok(Self {
            id,
            document: object,
            targets,
            permissions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> Option<&str> {
        self.document.get("created").and_then(Value::as_str)
    }

    pub fn modified(&self) -> Option<&str> {
        self.document.get("modified").and_then(Value::as_str)
    }

    pub fn motivation(&self) -> Option<&Value> {
        self.document.get("motivation")
    }

    pub fn body(&self) -> Option<&Value> {
        self.document.get("body")
    }

    pub fn permissions(&self) -> Option<&Value> {
        self.permissions.as_ref()
    }

    /// Parsed direct targets, in document order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Flattened `{id, type}` descriptors of all direct targets.
    pub fn target_info(&self) -> Vec<TargetDescriptor> {
        self.targets.iter().flat_map(Target::info).collect()
    }

    /// Flattened identifiers of all direct targets.
    pub fn target_ids(&self) -> Vec<String> {
        self.targets.iter().flat_map(Target::ids).collect()
    }

    /// Replaces the document with an updated version of the same annotation.
    ///
    /// `created` and `permissions` carry over when the update omits them.
    ///
    /// # Errors
    /// - `Validation` / `InvalidTarget` for malformed documents.
    /// - `IdMismatch` when the update's `id` is absent or differs.
    pub fn update(&mut self, document: Value) -> AnnotationResult<()> {
        validate(&document, Some(DocumentKind::Annotation))?;
        let received = document.get("id").and_then(Value::as_str);
        if received != Some(self.id.as_str()) {
            return Err(AnnotationError::IdMismatch {
                existing: self.id.clone(),
                received: received.map(str::to_string),
            });
        }

        let Value::Object(mut object) = document else {
            return Err(ValidationError::NotAnObject.into());
        };
        if !object.contains_key("created") {
            if let Some(created) = self.document.get("created") {
                object.insert("created".to_string(), created.clone());
            }
        }
        object.insert("modified".to_string(), Value::String(now_timestamp()));
        if !object.contains_key(PERMISSIONS_FIELD) {
            if let Some(permissions) = &self.permissions {
                object.insert(PERMISSIONS_FIELD.to_string(), permissions.clone());
            }
        }

        *self = Self::from_object(object)?;
        Ok(())
    }

    /// Caller-facing document without permissions or closure.
    pub fn to_document(&self) -> Value {
        Value::Object(self.document.clone())
    }

    /// Caller-facing document including stored permissions (`null` if none).
    pub fn to_document_with_permissions(&self) -> Value {
        let mut object = self.document.clone();
        object.insert(
            PERMISSIONS_FIELD.to_string(),
            self.permissions.clone().unwrap_or(Value::Null),
        );
        Value::Object(object)
    }

    /// Stored form: document, permissions and the computed closure.
    pub fn to_stored(&self, closure: &[TargetDescriptor]) -> AnnotationResult<Value> {
        let mut object = self.document.clone();
        if let Some(permissions) = &self.permissions {
            object.insert(PERMISSIONS_FIELD.to_string(), permissions.clone());
        }
        let closure = serde_json::to_value(closure).map_err(|err| {
            AnnotationError::InvalidData(format!("cannot encode {TARGET_CLOSURE_FIELD}: {err}"))
        })?;
        object.insert(TARGET_CLOSURE_FIELD.to_string(), closure);
        Ok(Value::Object(object))
    }
}
