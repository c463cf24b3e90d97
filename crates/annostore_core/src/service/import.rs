//! Bulk loading of annotations, pages and collections.
//!
//! # Responsibility
//! - Create every annotation of an `AnnotationPage`.
//! - Load `{"annotations": [...], "collections": [...]}` bundles from JSON,
//!   counting per-item domain failures instead of aborting.
//!
//! # Invariants
//! - Items are processed in document order; annotations before collections.
//! - Storage failures abort the import; earlier writes are kept.

use crate::error::{AnnotationError, AnnotationResult, StatusClass};
use crate::model::kind::DocumentKind;
use crate::model::validation::{validate, ValidationError};
use crate::repo::document_store::DocumentStore;
use crate::service::annotation_store::AnnotationStore;
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Bulk import failure.
#[derive(Debug)]
pub enum ImportError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    /// Top-level bundle has the wrong shape.
    InvalidBundle(&'static str),
    /// Non-recoverable store failure.
    Store(AnnotationError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read import file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "import file is not valid JSON: {err}"),
            Self::InvalidBundle(reason) => write!(f, "invalid import bundle: {reason}"),
            Self::Store(err) => write!(f, "import aborted: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::InvalidBundle(_) => None,
        }
    }
}

/// Item rejected during an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub kind: DocumentKind,
    /// Position in the bundle's list for `kind`.
    pub index: usize,
    pub status_code: u16,
    pub message: String,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub annotations_created: usize,
    pub collections_created: usize,
    pub members_added: usize,
    pub failures: Vec<ImportFailure>,
}

impl<S: DocumentStore> AnnotationStore<S> {
    /// Creates every annotation in `page.items`, in order.
    ///
    /// Stops at the first failing item; items created before it are kept.
    pub fn create_annotation_page(&self, page: Value) -> AnnotationResult<Vec<Value>> {
        validate(&page, Some(DocumentKind::AnnotationPage))?;
        let Some(Value::Array(items)) = page.get("items") else {
            return Err(ValidationError::MissingItems.into());
        };
        let created = items
            .iter()
            .map(|item| self.create_annotation(item.clone()))
            .collect::<AnnotationResult<Vec<_>>>()?;
        info!(
            "event=annotation_page_create module=import status=ok items={}",
            created.len()
        );
        Ok(created)
    }

    /// Reads and imports a JSON bundle file.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<ImportSummary, ImportError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: Value = serde_json::from_str(&text).map_err(ImportError::Parse)?;
        self.import_value(&bundle)
    }

    /// Imports `{"annotations": [...], "collections": [...]}`.
    ///
    /// Collection `items` are added as members after the collection is
    /// created.
    pub fn import_value(&self, bundle: &Value) -> Result<ImportSummary, ImportError> {
        let Value::Object(bundle) = bundle else {
            return Err(ImportError::InvalidBundle("expected a JSON object"));
        };
        let annotations = bundle_list(bundle.get("annotations"), "annotations must be a list")?;
        let collections = bundle_list(bundle.get("collections"), "collections must be a list")?;

        let mut summary = ImportSummary::default();
        for (index, document) in annotations.iter().enumerate() {
            match self.create_annotation(document.clone()) {
                Ok(_) => summary.annotations_created += 1,
                Err(err) => record_failure(&mut summary, DocumentKind::Annotation, index, err)?,
            }
        }

        for (index, document) in collections.iter().enumerate() {
            let created = match self.create_collection(document.clone()) {
                Ok(created) => created,
                Err(err) => {
                    record_failure(&mut summary, DocumentKind::AnnotationCollection, index, err)?;
                    continue;
                }
            };
            summary.collections_created += 1;

            let collection_id = created.get("id").and_then(Value::as_str).unwrap_or_default();
            let members = document.get("items").and_then(Value::as_array);
            for member in members.into_iter().flatten().filter_map(Value::as_str) {
                match self.add_member(collection_id, member) {
                    Ok(_) => summary.members_added += 1,
                    Err(err) => {
                        record_failure(&mut summary, DocumentKind::AnnotationCollection, index, err)?
                    }
                }
            }
        }

        info!(
            "event=import module=import status=ok annotations={} collections={} members={} failures={}",
            summary.annotations_created,
            summary.collections_created,
            summary.members_added,
            summary.failures.len()
        );
        Ok(summary)
    }
}

fn bundle_list<'a>(
    value: Option<&'a Value>,
    reason: &'static str,
) -> Result<&'a [Value], ImportError> {
    match value {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ImportError::InvalidBundle(reason)),
    }
}

fn record_failure(
    summary: &mut ImportSummary,
    kind: DocumentKind,
    index: usize,
    err: AnnotationError,
) -> Result<(), ImportError> {
    if err.status_class() == StatusClass::Internal {
        return Err(ImportError::Store(err));
    }
    warn!(
        "event=import_item module=import status=error kind={kind} index={index} status_code={} error={err}",
        err.status_code()
    );
    summary.failures.push(ImportFailure {
        kind,
        index,
        status_code: err.status_code(),
        message: err.to_string(),
    });
    Ok(())
}
