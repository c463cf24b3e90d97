//! Web Annotation domain model.
//!
//! # Responsibility
//! - Define validated entities for annotations and collections.
//! - Parse targets and selectors into strict shapes and flatten them.
//!
//! # Invariants
//! - Every entity is built from a document that passed structural validation.
//! - Deletion is represented by tombstones, never by physical removal.
//!
//! # See also
//! - <https://www.w3.org/TR/annotation-model/>

pub mod annotation;
pub mod collection;
pub mod kind;
pub mod record;
pub mod target;
pub mod validation;
