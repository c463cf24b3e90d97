//! In-memory document store with near-real-time search visibility.
//!
//! # Responsibility
//! - Back tests and embedded use without SQLite.
//! - Reproduce the visibility model of search engines: point reads see
//!   writes immediately, searches and listings only after `refresh()`.
//!
//! # Invariants
//! - `get`/`exists` always observe the latest write.
//! - `search_by_field`/`list` observe the state as of the last refresh.
//! - `refresh()` copies only documents written since the previous refresh.

use crate::model::kind::DocumentKind;
use crate::model::record::is_tombstone;
use crate::repo::document_store::{
    indexed_fields, DocumentListQuery, DocumentPage, DocumentStore, StoreError, StoreResult,
};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

type DocumentKey = (DocumentKind, String);

#[derive(Debug, Default)]
struct MemoryState {
    live: BTreeMap<DocumentKey, Value>,
    searchable: BTreeMap<DocumentKey, Value>,
    dirty: BTreeSet<DocumentKey>,
    refresh_count: u64,
}

/// Single-threaded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RefCell<MemoryState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents written or deleted but not yet visible to searches.
    pub fn pending_writes(&self) -> usize {
        self.state.borrow().dirty.len()
    }

    /// Number of `refresh()` calls served so far.
    pub fn refresh_count(&self) -> u64 {
        self.state.borrow().refresh_count
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn exists(&self, kind: DocumentKind, id: &str) -> StoreResult<bool> {
        Ok(self.state.borrow().live.contains_key(&(kind, id.to_string())))
    }

    fn get(&self, kind: DocumentKind, id: &str) -> StoreResult<Value> {
        self.state
            .borrow()
            .live
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    fn put(&self, kind: DocumentKind, id: &str, document: &Value) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        let key = (kind, id.to_string());
        state.live.insert(key.clone(), document.clone());
        state.dirty.insert(key);
        Ok(())
    }

    fn delete(&self, kind: DocumentKind, id: &str) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        let key = (kind, id.to_string());
        if state.live.remove(&key).is_none() {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        state.dirty.insert(key);
        Ok(())
    }

    fn search_by_field(
        &self,
        kind: DocumentKind,
        field_path: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>> {
        let state = self.state.borrow();
        Ok(state
            .searchable
            .iter()
            .filter(|((doc_kind, _), _)| *doc_kind == kind)
            .filter(|(_, document)| {
                indexed_fields(document)
                    .iter()
                    .any(|(path, text)| path == field_path && text == value)
            })
            .map(|(_, document)| document.clone())
            .collect())
    }

    fn refresh(&self) -> StoreResult<()> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        for key in std::mem::take(&mut state.dirty) {
            match state.live.get(&key) {
                Some(document) => {
                    state.searchable.insert(key, document.clone());
                }
                None => {
                    state.searchable.remove(&key);
                }
            }
        }
        state.refresh_count += 1;
        Ok(())
    }

    fn list(&self, query: &DocumentListQuery) -> StoreResult<DocumentPage> {
        let state = self.state.borrow();
        let matching: Vec<&Value> = state
            .searchable
            .iter()
            .filter(|((doc_kind, _), _)| *doc_kind == query.kind)
            .map(|(_, document)| document)
            .filter(|document| query.include_deleted || !is_tombstone(document))
            .collect();

        let offset = query.offset as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(DocumentPage {
            total: matching.len() as u64,
            documents: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryDocumentStore;
    use crate::model::kind::DocumentKind;
    use crate::repo::document_store::DocumentStore;
    use serde_json::json;

    #[test]
    fn searches_lag_until_refresh() {
        let store = MemoryDocumentStore::new();
        let doc = json!({"id": "urn:example:b", "targetClosure": [{"id": "urn:example:a"}]});
        store.put(DocumentKind::Annotation, "urn:example:b", &doc).unwrap();

        assert!(store.exists(DocumentKind::Annotation, "urn:example:b").unwrap());
        let hits = store
            .search_by_field(DocumentKind::Annotation, "targetClosure.id", "urn:example:a")
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.pending_writes(), 1);

        store.refresh().unwrap();
        let hits = store
            .search_by_field(DocumentKind::Annotation, "targetClosure.id", "urn:example:a")
            .unwrap();
        assert_eq!(hits, vec![doc]);
        assert_eq!(store.refresh_count(), 1);
    }

    #[test]
    fn refresh_applies_deletes_and_counts_documents_once() {
        let store = MemoryDocumentStore::new();
        let doc = json!({"id": "urn:example:b", "targetClosure": [{"id": "urn:example:a"}]});
        store.put(DocumentKind::Annotation, "urn:example:b", &doc).unwrap();
        store.put(DocumentKind::Annotation, "urn:example:b", &doc).unwrap();
        assert_eq!(store.pending_writes(), 1);
        store.refresh().unwrap();
        assert_eq!(store.pending_writes(), 0);

        store.delete(DocumentKind::Annotation, "urn:example:b").unwrap();
        let hits = store
            .search_by_field(DocumentKind::Annotation, "targetClosure.id", "urn:example:a")
            .unwrap();
        assert_eq!(hits.len(), 1);

        store.refresh().unwrap();
        let hits = store
            .search_by_field(DocumentKind::Annotation, "targetClosure.id", "urn:example:a")
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.refresh_count(), 2);
    }
}
