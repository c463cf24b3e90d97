//! Annotation collection entity and membership rules.
//!
//! # Invariants
//! - `total` always equals the number of member ids.
//! - Member ids are unique and keep insertion order.
//! - Membership is owned by add/remove operations; inbound `items`, `total`,
//!   `first` and `last` values on create or update are not taken over.
//! - Emitted documents carry `first`/`last` next to `total`, so they pass
//!   `validate` and can be sent back unchanged.

use crate::error::{AnnotationError, AnnotationResult};
use crate::model::kind::DocumentKind;
use crate::model::record::{new_document_id, now_timestamp};
use crate::model::validation::{validate, ValidationError};
use serde_json::{Map, Value};

const ITEMS_FIELD: &str = "items";
const TOTAL_FIELD: &str = "total";
const FIRST_FIELD: &str = "first";
const LAST_FIELD: &str = "last";

/// Validated annotation collection with its member ids.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationCollection {
    id: String,
    document: Map<String, Value>,
    items: Vec<String>,
}

impl AnnotationCollection {
    /// Builds an empty collection from an inbound document.
    ///
    /// Assigns `id` and `created` when absent.
    pub fn new(document: Value) -> AnnotationResult<Self> {
        validate(&document, Some(DocumentKind::AnnotationCollection))?;
        let Value::Object(mut object) = document else {
            return Err(ValidationError::NotAnObject.into());
        };
        object
            .entry("id")
            .or_insert_with(|| Value::String(new_document_id()));
        object
            .entry("created")
            .or_insert_with(|| Value::String(now_timestamp()));
        Self::from_parts(object, Vec::new())
    }

    /// Decodes a stored collection record.
    pub fn from_stored(stored: Value) -> AnnotationResult<Self> {
        let Value::Object(mut object) = stored else {
            return Err(AnnotationError::InvalidData(
                "stored collection is not an object".to_string(),
            ));
        };
        let items = match object.remove(ITEMS_FIELD) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .into_iter()
                .map(|value| match value {
                    Value::String(id) => Ok(id),
                    other => Err(AnnotationError::InvalidData(format!(
                        "collection member id is not a string: {other}"
                    ))),
                })
                .collect::<AnnotationResult<Vec<_>>>()?,
            Some(other) => {
                return Err(AnnotationError::InvalidData(format!(
                    "collection items is not a list: {other}"
                )))
            }
        };
        Self::from_parts(object, items)
            .map_err(|err| AnnotationError::InvalidData(format!("stored collection: {err}")))
    }

    fn from_parts(mut object: Map<String, Value>, items: Vec<String>) -> AnnotationResult<Self> {
        for field in [ITEMS_FIELD, TOTAL_FIELD, FIRST_FIELD, LAST_FIELD] {
            object.remove(field);
        }
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ValidationError::IdNotString)?;
        Ok(Self {
            id,
            document: object,
            items,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.document.get("label").and_then(Value::as_str)
    }

    /// Member annotation ids in insertion order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, annotation_id: &str) -> bool {
        self.items.iter().any(|item| item == annotation_id)
    }

    /// Appends a member id.
    ///
    /// # Errors
    /// - `DuplicateMember` when the id is already present.
    pub fn add_member(&mut self, annotation_id: &str) -> AnnotationResult<()> {
        if self.contains(annotation_id) {
            return Err(AnnotationError::DuplicateMember {
                collection_id: self.id.clone(),
                annotation_id: annotation_id.to_string(),
            });
        }
        self.items.push(annotation_id.to_string());
        Ok(())
    }

    /// Removes a member id.
    ///
    /// # Errors
    /// - `NotAMember` when the id is absent.
    pub fn remove_member(&mut self, annotation_id: &str) -> AnnotationResult<()> {
        let position = self
            .items
            .iter()
            .position(|item| item == annotation_id)
            .ok_or_else(|| AnnotationError::NotAMember {
                collection_id: self.id.clone(),
                annotation_id: annotation_id.to_string(),
            })?;
        self.items.remove(position);
        Ok(())
    }

    /// Replaces collection metadata, keeping identity, `created` and members.
    pub fn update(&mut self, document: Value) -> AnnotationResult<()> {
        validate(&document, Some(DocumentKind::AnnotationCollection))?;
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

        let items = std::mem::take(&mut self.items);
        *self = Self::from_parts(object, items)?;
        Ok(())
    }

    /// IRI of the single page holding every member.
    pub fn page_iri(&self) -> String {
        format!("{}?page=0", self.id)
    }

    /// Document with `items` and `total` reflecting current membership.
    ///
    /// Members are inlined in one page, so `first` and `last` name the same
    /// page IRI.
    pub fn to_document(&self) -> Value {
        let mut object = self.document.clone();
        let page = self.page_iri();
        object.insert(FIRST_FIELD.to_string(), Value::String(page.clone()));
        object.insert(LAST_FIELD.to_string(), Value::String(page));
        object.insert(
            ITEMS_FIELD.to_string(),
            Value::Array(self.items.iter().cloned().map(Value::String).collect()),
        );
        object.insert(TOTAL_FIELD.to_string(), Value::from(self.items.len()));
        Value::Object(object)
    }
}
