//! Domain error surfaced by annotation store operations.
//!
//! # Responsibility
//! - Carry one structured failure per operation: message plus a fixed
//!   status classification.
//!
//! # Invariants
//! - Storage failures are wrapped, never reinterpreted, except store-level
//!   `NotFound` which maps to the domain not-found variant.
//! - Every variant maps to exactly one status class.

use crate::model::kind::DocumentKind;
use crate::model::target::TargetError;
use crate::model::validation::ValidationError;
use crate::repo::document_store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// Fixed status classification attached to every [`AnnotationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl StatusClass {
    /// HTTP-compatible numeric code.
    pub fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug)]
pub enum AnnotationError {
    /// Inbound document violates a structural rule.
    Validation(ValidationError),
    /// A target or selector has an unusable shape.
    InvalidTarget(TargetError),
    /// Referenced document is absent or tombstoned.
    NotFound { kind: DocumentKind, id: String },
    /// A document with this id already exists (tombstones included).
    AlreadyExists { kind: DocumentKind, id: String },
    /// Annotation targets itself directly.
    SelfTarget { id: String },
    /// Annotation reaches itself through other annotations.
    TargetCycle { path: Vec<String> },
    /// Closure traversal exceeded the configured depth.
    GraphTooDeep { id: String, limit: usize },
    /// Annotation is already a member of the collection.
    DuplicateMember {
        collection_id: String,
        annotation_id: String,
    },
    /// Annotation is not a member of the collection.
    NotAMember {
        collection_id: String,
        annotation_id: String,
    },
    /// Update payload id differs from the stored record id.
    IdMismatch {
        existing: String,
        received: Option<String>,
    },
    /// Persisted document cannot be decoded.
    InvalidData(String),
    /// Storage-layer failure.
    Store(StoreError),
}

impl AnnotationError {
    /// Returns the status class of this error.
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::NotFound { .. } => StatusClass::NotFound,
            Self::AlreadyExists { .. } => StatusClass::Conflict,
            Self::InvalidData(_) | Self::Store(_) => StatusClass::Internal,
            Self::Validation(_)
            | Self::InvalidTarget(_)
            | Self::SelfTarget { .. }
            | Self::TargetCycle { .. }
            | Self::GraphTooDeep { .. }
            | Self::DuplicateMember { .. }
            | Self::NotAMember { .. }
            | Self::IdMismatch { .. } => StatusClass::BadRequest,
        }
    }

    /// Shorthand for `status_class().code()`.
    pub fn status_code(&self) -> u16 {
        self.status_class().code()
    }
}

impl Display for AnnotationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidTarget(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} with id {id} does not exist"),
            Self::AlreadyExists { kind, id } => write!(f, "{kind} with id {id} already exists"),
            Self::SelfTarget { id } => write!(f, "annotation cannot target itself: {id}"),
            Self::TargetCycle { path } => {
                write!(f, "annotation target cycle: {}", path.join(" -> "))
            }
            Self::GraphTooDeep { id, limit } => write!(
                f,
                "target graph of {id} exceeds the maximum depth of {limit}"
            ),
            Self::DuplicateMember {
                collection_id,
                annotation_id,
            } => write!(
                f,
                "collection {collection_id} already contains annotation {annotation_id}"
            ),
            Self::NotAMember {
                collection_id,
                annotation_id,
            } => write!(
                f,
                "collection {collection_id} does not contain annotation {annotation_id}"
            ),
            Self::IdMismatch { existing, received } => match received {
                Some(received) => write!(
                    f,
                    "ID of updated annotation ({received}) does not match ID of existing annotation ({existing})"
                ),
                None => write!(
                    f,
                    "updated annotation has no id; expected {existing}"
                ),
            },
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AnnotationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidTarget(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for AnnotationError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TargetError> for AnnotationError {
    fn from(value: TargetError) -> Self {
        Self::InvalidTarget(value)
    }
}

impl From<StoreError> for AnnotationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}
