//! Annotation store facade.
//!
//! # Responsibility
//! - Orchestrate validation, target resolution, closure computation and
//!   persistence into create/get/update/delete/list use-cases.
//! - Own the refresh policy for near-real-time document stores.
//!
//! # Invariants
//! - Every write marks the store dirty; every read or search first refreshes
//!   a dirty store.
//! - Documents returned to callers never carry `targetClosure`.
//! - Tombstoned records behave as absent for reads and updates.

use crate::config::StoreConfig;
use crate::error::{AnnotationError, AnnotationResult};
use crate::model::annotation::Annotation;
use crate::model::kind::DocumentKind;
use crate::model::record::{is_tombstone, Tombstone, TARGET_CLOSURE_ID_PATH};
use crate::repo::document_store::{DocumentListQuery, DocumentPage, DocumentStore, StoreError};
use log::{debug, info, warn};
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashSet;

/// One page of active annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationList {
    /// Active annotations across all pages.
    pub total: u64,
    pub annotations: Vec<Value>,
}

/// Annotation store over a [`DocumentStore`] backend.
pub struct AnnotationStore<S: DocumentStore> {
    store: S,
    config: StoreConfig,
    needs_refresh: Cell<bool>,
}

impl<S: DocumentStore> AnnotationStore<S> {
    /// Creates a store with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, StoreConfig::default())
    }

    pub fn with_config(store: S, config: StoreConfig) -> Self {
        Self {
            store,
            config,
            needs_refresh: Cell::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether writes happened since the last refresh.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh.get()
    }

    /// Creates one annotation and returns the stored caller-facing document.
    ///
    /// # Errors
    /// - `Validation` / `InvalidTarget` for malformed documents.
    /// - `AlreadyExists` when the id is taken, tombstones included.
    /// - `SelfTarget` / `TargetCycle` / `GraphTooDeep` / `NotFound` from
    ///   closure computation.
    pub fn create_annotation(&self, document: Value) -> AnnotationResult<Value> {
        let result = self.create_annotation_inner(document);
        match &result {
            Ok(created) => info!(
                "event=annotation_create module=store status=ok id={}",
                created.get("id").and_then(Value::as_str).unwrap_or("-")
            ),
            Err(err) => warn!(
                "event=annotation_create module=store status=error status_code={} error={err}",
                err.status_code()
            ),
        }
        result
    }

    fn create_annotation_inner(&self, document: Value) -> AnnotationResult<Value> {
        let annotation = Annotation::new(document)?;
        if self.record_exists(DocumentKind::Annotation, annotation.id())? {
            return Err(AnnotationError::AlreadyExists {
                kind: DocumentKind::Annotation,
                id: annotation.id().to_string(),
            });
        }
        let closure = self.compute_closure(&annotation)?;
        self.write(
            DocumentKind::Annotation,
            annotation.id(),
            &annotation.to_stored(&closure)?,
        )?;
        Ok(annotation.to_document())
    }

    /// Returns one active annotation.
    ///
    /// `permissions` is included (as `null` when unset) only when requested.
    pub fn get_annotation(&self, id: &str, include_permissions: bool) -> AnnotationResult<Value> {
        let stored = self.load_active(DocumentKind::Annotation, id)?;
        let (annotation, _) = Annotation::from_stored(stored)?;
        Ok(if include_permissions {
            annotation.to_document_with_permissions()
        } else {
            annotation.to_document()
        })
    }

    /// Replaces annotation `id` with `document` and propagates closure changes.
    ///
    /// # Errors
    /// - `NotFound` when `id` is missing or tombstoned.
    /// - `IdMismatch` when `document.id` differs from `id`.
    /// - Validation, closure and store errors as for create.
    pub fn update_annotation(&self, id: &str, document: Value) -> AnnotationResult<Value> {
        let result = self.update_annotation_inner(id, document);
        match &result {
            Ok(_) => info!("event=annotation_update module=store status=ok id={id}"),
            Err(err) => warn!(
                "event=annotation_update module=store status=error id={id} status_code={} error={err}",
                err.status_code()
            ),
        }
        result
    }

    fn update_annotation_inner(&self, id: &str, document: Value) -> AnnotationResult<Value> {
        let stored = self.load_active(DocumentKind::Annotation, id)?;
        let (mut annotation, previous_closure) = Annotation::from_stored(stored)?;
        annotation.update(document)?;

        let closure = self.compute_closure(&annotation)?;
        self.write(
            DocumentKind::Annotation,
            annotation.id(),
            &annotation.to_stored(&closure)?,
        )?;

        let before: HashSet<&str> = previous_closure.iter().map(|d| d.id.as_str()).collect();
        let after: HashSet<&str> = closure.iter().map(|d| d.id.as_str()).collect();
        if before.symmetric_difference(&after).next().is_some() {
            self.propagate_change(annotation.id())?;
        }
        Ok(annotation.to_document())
    }

    /// Replaces annotation `id` by a tombstone and recomputes its dependents.
    ///
    /// # Errors
    /// - `NotFound` when `id` is missing or already tombstoned.
    pub fn delete_annotation(&self, id: &str) -> AnnotationResult<()> {
        let result = self
            .load_active(DocumentKind::Annotation, id)
            .and_then(|_| {
                let tombstone = Tombstone::new(id, DocumentKind::Annotation);
                self.write(DocumentKind::Annotation, id, &tombstone.to_document())
            })
            .and_then(|()| self.propagate_change(id).map(|_| ()));
        match &result {
            Ok(()) => info!("event=annotation_delete module=store status=ok id={id}"),
            Err(err) => warn!(
                "event=annotation_delete module=store status=error id={id} status_code={} error={err}",
                err.status_code()
            ),
        }
        result
    }

    /// Lists active annotations, `page` counted from zero.
    pub fn list_annotations(&self, page: u32) -> AnnotationResult<AnnotationList> {
        let listed = self.list_page(DocumentKind::Annotation, page)?;
        let annotations = listed
            .documents
            .into_iter()
            .map(|stored| Annotation::from_stored(stored).map(|(a, _)| a.to_document()))
            .collect::<AnnotationResult<Vec<_>>>()?;
        Ok(AnnotationList {
            total: listed.total,
            annotations,
        })
    }

    /// Active annotations among `ids`, in input order; unknown ids are skipped.
    pub fn annotations_by_ids<I>(&self, ids: I) -> AnnotationResult<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut annotations = Vec::new();
        for id in ids {
            match self.load_active(DocumentKind::Annotation, id.as_ref()) {
                Ok(stored) => annotations.push(Annotation::from_stored(stored)?.0.to_document()),
                Err(AnnotationError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(annotations)
    }

    /// Active annotations that target `target_id` directly or transitively.
    pub fn annotations_by_target(&self, target_id: &str) -> AnnotationResult<Vec<Value>> {
        self.ensure_fresh()?;
        self.store
            .search_by_field(DocumentKind::Annotation, TARGET_CLOSURE_ID_PATH, target_id)?
            .into_iter()
            .filter(|stored| !is_tombstone(stored))
            .map(|stored| Annotation::from_stored(stored).map(|(a, _)| a.to_document()))
            .collect()
    }

    /// Refreshes the document store now, regardless of the dirty flag.
    pub fn refresh(&self) -> AnnotationResult<()> {
        self.store.refresh()?;
        self.needs_refresh.set(false);
        debug!("event=store_refresh module=store status=ok");
        Ok(())
    }

    /// Refreshes the document store only when writes are pending.
    pub(crate) fn ensure_fresh(&self) -> AnnotationResult<()> {
        if self.needs_refresh.get() {
            self.refresh()?;
        }
        Ok(())
    }

    /// Persists a document and marks the store dirty.
    pub(crate) fn write(&self, kind: DocumentKind, id: &str, document: &Value) -> AnnotationResult<()> {
        self.store.put(kind, id, document)?;
        self.needs_refresh.set(true);
        Ok(())
    }

    pub(crate) fn record_exists(&self, kind: DocumentKind, id: &str) -> AnnotationResult<bool> {
        self.ensure_fresh()?;
        Ok(self.store.exists(kind, id)?)
    }

    /// Stored record of `kind`/`id`, tombstones included.
    pub(crate) fn load_record(&self, kind: DocumentKind, id: &str) -> AnnotationResult<Value> {
        self.ensure_fresh()?;
        Ok(self.store.get(kind, id)?)
    }

    /// Stored record of `kind`/`id`; tombstones are reported as `NotFound`.
    pub(crate) fn load_active(&self, kind: DocumentKind, id: &str) -> AnnotationResult<Value> {
        let stored = self.load_record(kind, id)?;
        if is_tombstone(&stored) {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            }
            .into());
        }
        Ok(stored)
    }

    pub(crate) fn list_page(&self, kind: DocumentKind, page: u32) -> AnnotationResult<DocumentPage> {
        self.ensure_fresh()?;
        let page_size = self.config.page_size;
        let query = DocumentListQuery {
            limit: Some(page_size),
            offset: page.saturating_mul(page_size),
            ..DocumentListQuery::new(kind)
        };
        Ok(self.store.list(&query)?)
    }
}
