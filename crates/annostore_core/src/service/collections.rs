//! Annotation collection use-cases.
//!
//! # Invariants
//! - Only active annotations can be added to an active collection.
//! - Stored collections always carry `total == items.len()`.

use crate::error::{AnnotationError, AnnotationResult};
use crate::model::collection::AnnotationCollection;
use crate::model::kind::DocumentKind;
use crate::model::record::Tombstone;
use crate::repo::document_store::DocumentStore;
use crate::service::annotation_store::AnnotationStore;
use log::{info, warn};
use serde_json::Value;

/// One page of active collections.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionList {
    pub total: u64,
    pub collections: Vec<Value>,
}

impl<S: DocumentStore> AnnotationStore<S> {
    /// Creates an empty collection.
    pub fn create_collection(&self, document: Value) -> AnnotationResult<Value> {
        let collection = AnnotationCollection::new(document)?;
        if self.record_exists(DocumentKind::AnnotationCollection, collection.id())? {
            return Err(AnnotationError::AlreadyExists {
                kind: DocumentKind::AnnotationCollection,
                id: collection.id().to_string(),
            });
        }
        let stored = collection.to_document();
        self.write(DocumentKind::AnnotationCollection, collection.id(), &stored)?;
        info!(
            "event=collection_create module=collections status=ok id={}",
            collection.id()
        );
        Ok(stored)
    }

    pub fn get_collection(&self, id: &str) -> AnnotationResult<Value> {
        Ok(self.load_collection(id)?.to_document())
    }

    /// Lists active collections, `page` counted from zero.
    pub fn list_collections(&self, page: u32) -> AnnotationResult<CollectionList> {
        let listed = self.list_page(DocumentKind::AnnotationCollection, page)?;
        let collections = listed
            .documents
            .into_iter()
            .map(|stored| AnnotationCollection::from_stored(stored).map(|c| c.to_document()))
            .collect::<AnnotationResult<Vec<_>>>()?;
        Ok(CollectionList {
            total: listed.total,
            collections,
        })
    }

    /// Replaces collection metadata; membership is kept.
    pub fn update_collection(&self, id: &str, document: Value) -> AnnotationResult<Value> {
        let mut collection = self.load_collection(id)?;
        collection.update(document)?;
        self.save_collection(&collection)
    }

    /// Replaces a collection by a tombstone. Member annotations are untouched.
    pub fn delete_collection(&self, id: &str) -> AnnotationResult<()> {
        self.load_collection(id)?;
        let tombstone = Tombstone::new(id, DocumentKind::AnnotationCollection);
        self.write(
            DocumentKind::AnnotationCollection,
            id,
            &tombstone.to_document(),
        )?;
        info!("event=collection_delete module=collections status=ok id={id}");
        Ok(())
    }

    /// Appends an active annotation to an active collection.
    ///
    /// # Errors
    /// - `NotFound` when either document is missing or tombstoned.
    /// - `DuplicateMember` when the annotation is already a member.
    pub fn add_member(&self, collection_id: &str, annotation_id: &str) -> AnnotationResult<Value> {
        let result = self.load_collection(collection_id).and_then(|mut collection| {
            self.load_active(DocumentKind::Annotation, annotation_id)?;
            collection.add_member(annotation_id)?;
            self.save_collection(&collection)
        });
        log_membership("collection_member_add", collection_id, annotation_id, &result);
        result
    }

    /// Removes an annotation id from an active collection.
    ///
    /// The annotation itself may already be deleted.
    pub fn remove_member(
        &self,
        collection_id: &str,
        annotation_id: &str,
    ) -> AnnotationResult<Value> {
        let result = self.load_collection(collection_id).and_then(|mut collection| {
            collection.remove_member(annotation_id)?;
            self.save_collection(&collection)
        });
        log_membership("collection_member_remove", collection_id, annotation_id, &result);
        result
    }

    fn load_collection(&self, id: &str) -> AnnotationResult<AnnotationCollection> {
        let stored = self.load_active(DocumentKind::AnnotationCollection, id)?;
        AnnotationCollection::from_stored(stored)
    }

    fn save_collection(&self, collection: &AnnotationCollection) -> AnnotationResult<Value> {
        let stored = collection.to_document();
        self.write(DocumentKind::AnnotationCollection, collection.id(), &stored)?;
        Ok(stored)
    }
}

fn log_membership(
    event: &str,
    collection_id: &str,
    annotation_id: &str,
    result: &AnnotationResult<Value>,
) {
    match result {
        Ok(stored) => info!(
            "event={event} module=collections status=ok collection_id={collection_id} annotation_id={annotation_id} total={}",
            stored.get("total").and_then(Value::as_u64).unwrap_or_default()
        ),
        Err(err) => warn!(
            "event={event} module=collections status=error collection_id={collection_id} annotation_id={annotation_id} status_code={} error={err}",
            err.status_code()
        ),
    }
}
