//! Structural validation of Web Annotation documents.
//!
//! # Responsibility
//! - Check inbound JSON-LD documents against the structural rules of the
//!   Web Annotation data model before any entity is built from them.
//!
//! # Invariants
//! - Validation never mutates its input.
//! - Checks run in a fixed order: envelope, primary type, per-kind rules.
//! - A document has exactly one of the three primary kinds.

use crate::model::kind::DocumentKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Canonical JSON-LD context every document must declare.
pub const ANNOTATION_CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";

static IRI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z][A-Za-z0-9+.\-]*:(?:[^\s<>"{}|\\^`%]|%[0-9A-Fa-f]{2})+$"#)
        .expect("valid iri regex")
});

/// Structural rule violated by an inbound document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Input is not a JSON object.
    NotAnObject,
    /// `@context` property is absent.
    MissingContext,
    /// `@context` is present but not the canonical Web Annotation context.
    InvalidContext(String),
    /// `id` is present but not a string.
    IdNotString,
    /// `type` property is absent.
    MissingType,
    /// None of the primary kinds appear in `type`.
    NoPrimaryType,
    /// More than one primary kind appears in `type`.
    MultiplePrimaryTypes(Vec<DocumentKind>),
    /// Caller expected a different primary kind.
    UnexpectedKind {
        expected: DocumentKind,
        found: DocumentKind,
    },
    /// Annotation has no `target`.
    MissingTarget,
    /// Target is neither a string nor an object carrying `id` or `source`.
    TargetWithoutIri,
    /// Target identifier is not a syntactically valid IRI.
    InvalidTargetIri(String),
    /// Page has no `items`.
    MissingItems,
    /// Page `items` is not a non-empty list.
    EmptyItems,
    /// Collection has no `label`.
    MissingLabel,
    /// Collection `label` is not a string.
    LabelNotString,
    /// Collection declares `total` without `first`/`last`.
    IncompleteCollection { missing: &'static str },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "annotation MUST be a JSON object"),
            Self::MissingContext => write!(f, "annotation MUST have a @context"),
            Self::InvalidContext(actual) => write!(
                f,
                "annotation @context MUST be \"{ANNOTATION_CONTEXT}\", got {actual}"
            ),
            Self::IdNotString => write!(f, "annotation id MUST be a string"),
            Self::MissingType => write!(f, "annotation MUST have a type"),
            Self::NoPrimaryType => write!(
                f,
                "annotation type MUST have one of \"Annotation\", \"AnnotationCollection\", \"AnnotationPage\""
            ),
            Self::MultiplePrimaryTypes(kinds) => {
                let labels: Vec<&str> = kinds.iter().map(|kind| kind.as_str()).collect();
                write!(
                    f,
                    "annotation cannot have multiple annotation types: {}",
                    labels.join(", ")
                )
            }
            Self::UnexpectedKind { expected, found } => {
                write!(f, "annotation is not of type {expected} (found {found})")
            }
            Self::MissingTarget => write!(f, "annotation MUST have at least one target"),
            Self::TargetWithoutIri => {
                write!(f, "external annotation target MUST have an IRI identifier")
            }
            Self::InvalidTargetIri(value) => {
                write!(f, "annotation target id MUST be an IRI: `{value}`")
            }
            Self::MissingItems => write!(
                f,
                "annotation page MUST have an \"items\" property with at least one annotation"
            ),
            Self::EmptyItems => write!(
                f,
                "annotation page \"items\" property MUST be a list with at least one annotation"
            ),
            Self::MissingLabel => write!(
                f,
                "annotation collection MUST have a \"label\" property with a string value"
            ),
            Self::LabelNotString => {
                write!(f, "annotation collection \"label\" property MUST be a string")
            }
            Self::IncompleteCollection { missing } => write!(
                f,
                "non-empty collection MUST have a \"{missing}\" property referencing an AnnotationPage"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Validates a document and returns its primary kind.
///
/// When `expected` is set, the document must be of that kind.
///
/// # Errors
/// - Returns the first violated rule; later rules are not evaluated.
pub fn validate(
    document: &Value,
    expected: Option<DocumentKind>,
) -> Result<DocumentKind, ValidationError> {
    let object = document.as_object().ok_or(ValidationError::NotAnObject)?;
    match object.get("@context") {
        None => return Err(ValidationError::MissingContext),
        Some(Value::String(context)) if context == ANNOTATION_CONTEXT => {}
        Some(other) => return Err(ValidationError::InvalidContext(other.to_string())),
    }
    if object.get("id").is_some_and(|id| !id.is_string()) {
        return Err(ValidationError::IdNotString);
    }
    let type_value = object.get("type").ok_or(ValidationError::MissingType)?;

    let found = primary_kind(type_value)?;
    if let Some(expected) = expected {
        if expected != found {
            return Err(ValidationError::UnexpectedKind { expected, found });
        }
    }

    match found {
        DocumentKind::Annotation => validate_annotation(document)?,
        DocumentKind::AnnotationPage => validate_annotation_page(document)?,
        DocumentKind::AnnotationCollection => validate_annotation_collection(document)?,
    }
    Ok(found)
}

/// Resolves the single primary kind declared by a `type` value.
pub fn primary_kind(type_value: &Value) -> Result<DocumentKind, ValidationError> {
    let mut kinds: Vec<DocumentKind> = type_labels(type_value)
        .into_iter()
        .filter_map(DocumentKind::from_label)
        .collect();
    kinds.sort();
    kinds.dedup();
    match kinds.len() {
        0 => Err(ValidationError::NoPrimaryType),
        1 => Ok(kinds[0]),
        _ => Err(ValidationError::MultiplePrimaryTypes(kinds)),
    }
}

/// Returns whether `value` is a syntactically valid absolute IRI.
pub fn is_iri(value: &str) -> bool {
    IRI_RE.is_match(value)
}

/// Returns string labels of a `type` value that is either a string or a list.
pub fn type_labels(type_value: &Value) -> Vec<&str> {
    as_list(type_value)
        .into_iter()
        .filter_map(Value::as_str)
        .collect()
}

/// Treats a JSON value as a list: arrays yield their items, scalars themselves.
pub(crate) fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn validate_annotation(document: &Value) -> Result<(), ValidationError> {
    let targets = match document.get("target") {
        None => return Err(ValidationError::MissingTarget),
        Some(Value::Array(items)) if items.is_empty() => return Err(ValidationError::MissingTarget),
        Some(targets) => targets,
    };
    for target in as_list(targets) {
        let target_id = match target {
            Value::String(id) => id.as_str(),
            Value::Object(object) => object
                .get("id")
                .or_else(|| object.get("source"))
                .and_then(Value::as_str)
                .ok_or(ValidationError::TargetWithoutIri)?,
            _ => return Err(ValidationError::TargetWithoutIri),
        };
        if !is_iri(target_id) {
            return Err(ValidationError::InvalidTargetIri(target_id.to_string()));
        }
    }
    Ok(())
}

fn validate_annotation_page(document: &Value) -> Result<(), ValidationError> {
    match document.get("items") {
        None => Err(ValidationError::MissingItems),
        Some(Value::Array(items)) if !items.is_empty() => Ok(()),
        Some(_) => Err(ValidationError::EmptyItems),
    }
}

fn validate_annotation_collection(document: &Value) -> Result<(), ValidationError> {
    match document.get("label") {
        None => return Err(ValidationError::MissingLabel),
        Some(Value::String(_)) => {}
        Some(_) => return Err(ValidationError::LabelNotString),
    }
    if document.get("total").is_some() {
        if document.get("first").is_none() {
            return Err(ValidationError::IncompleteCollection { missing: "first" });
        }
        if document.get("last").is_none() {
            return Err(ValidationError::IncompleteCollection { missing: "last" });
        }
    }
    Ok(())
}
