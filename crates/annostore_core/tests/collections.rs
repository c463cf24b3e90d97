use annostore_core::{
    validate, AnnotationError, AnnotationStore, DocumentKind, MemoryDocumentStore,
};
use serde_json::{json, Value};

const CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";

fn store_with_annotations(ids: &[&str]) -> AnnotationStore<MemoryDocumentStore> {
    let store = AnnotationStore::new(MemoryDocumentStore::new());
    for id in ids {
        store
            .create_annotation(json!({
                "@context": CONTEXT,
                "id": id,
                "type": "Annotation",
                "target": "urn:example:page",
            }))
            .unwrap();
    }
    store
}

fn collection(id: &str) -> Value {
    json!({
        "@context": CONTEXT,
        "id": id,
        "type": "AnnotationCollection",
        "label": "Reading notes",
    })
}

#[test]
fn add_and_remove_members_keep_total_in_sync() {
    let store = store_with_annotations(&["urn:example:a", "urn:example:b"]);
    let created = store.create_collection(collection("urn:example:col")).unwrap();
    assert_eq!(created["total"], 0);
    assert_eq!(created["items"], json!([]));

    store.add_member("urn:example:col", "urn:example:a").unwrap();
    let after_add = store.add_member("urn:example:col", "urn:example:b").unwrap();
    assert_eq!(after_add["items"], json!(["urn:example:a", "urn:example:b"]));
    assert_eq!(after_add["total"], 2);

    let after_remove = store
        .remove_member("urn:example:col", "urn:example:a")
        .unwrap();
    assert_eq!(after_remove["items"], json!(["urn:example:b"]));
    assert_eq!(after_remove["total"], 1);
    assert_eq!(store.get_collection("urn:example:col").unwrap(), after_remove);
}

#[test]
fn duplicate_member_and_non_member_removal_fail() {
    let store = store_with_annotations(&["urn:example:a"]);
    store.create_collection(collection("urn:example:col")).unwrap();
    store.add_member("urn:example:col", "urn:example:a").unwrap();

    let err = store
        .add_member("urn:example:col", "urn:example:a")
        .unwrap_err();
    assert!(matches!(err, AnnotationError::DuplicateMember { .. }));
    assert_eq!(err.status_code(), 400);

    let err = store
        .remove_member("urn:example:col", "urn:example:zzz")
        .unwrap_err();
    assert!(matches!(err, AnnotationError::NotAMember { .. }));

    let stored = store.get_collection("urn:example:col").unwrap();
    assert_eq!(stored["total"], 1);
}

#[test]
fn members_must_be_active_annotations() {
    let store = store_with_annotations(&["urn:example:a"]);
    store.create_collection(collection("urn:example:col")).unwrap();

    let err = store
        .add_member("urn:example:col", "urn:example:missing")
        .unwrap_err();
    assert!(matches!(err, AnnotationError::NotFound { .. }));

    store.delete_annotation("urn:example:a").unwrap();
    let err = store
        .add_member("urn:example:col", "urn:example:a")
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let err = store
        .add_member("urn:example:nowhere", "urn:example:a")
        .unwrap_err();
    assert!(matches!(err, AnnotationError::NotFound { .. }));
}

#[test]
fn deleted_annotation_can_still_be_removed_from_collection() {
    let store = store_with_annotations(&["urn:example:a"]);
    store.create_collection(collection("urn:example:col")).unwrap();
    store.add_member("urn:example:col", "urn:example:a").unwrap();
    store.delete_annotation("urn:example:a").unwrap();

    let updated = store
        .remove_member("urn:example:col", "urn:example:a")
        .unwrap();
    assert_eq!(updated["total"], 0);
}

#[test]
fn inbound_membership_is_ignored_and_update_keeps_members() {
    let store = store_with_annotations(&["urn:example:a"]);
    let mut document = collection("urn:example:col");
    document["items"] = json!(["urn:example:forged"]);
    let created = store.create_collection(document).unwrap();
    assert_eq!(created["items"], json!([]));

    store.add_member("urn:example:col", "urn:example:a").unwrap();
    let mut renamed = collection("urn:example:col");
    renamed["label"] = json!("Renamed");
    let updated = store
        .update_collection("urn:example:col", renamed)
        .unwrap();
    assert_eq!(updated["label"], "Renamed");
    assert_eq!(updated["items"], json!(["urn:example:a"]));
    assert_eq!(updated["created"], created["created"]);
    assert!(updated["modified"].is_string());
}

#[test]
fn collections_are_listed_and_tombstoned() {
    let store = store_with_annotations(&[]);
    store.create_collection(collection("urn:example:c1")).unwrap();
    store.create_collection(collection("urn:example:c2")).unwrap();

    let err = store
        .create_collection(collection("urn:example:c1"))
        .unwrap_err();
    assert!(matches!(err, AnnotationError::AlreadyExists { .. }));

    store.delete_collection("urn:example:c1").unwrap();
    let listed = store.list_collections(0).unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.collections[0]["id"], "urn:example:c2");

    let err = store.get_collection("urn:example:c1").unwrap_err();
    assert_eq!(err.status_code(), 404);
    let err = store
        .add_member("urn:example:c1", "urn:example:a")
        .unwrap_err();
    assert!(matches!(err, AnnotationError::NotFound { .. }));
}

#[test]
fn fetched_collection_can_be_edited_and_sent_back() {
    let store = store_with_annotations(&["urn:example:a"]);
    let created = store.create_collection(collection("urn:example:col")).unwrap();
    assert!(validate(&created, Some(DocumentKind::AnnotationCollection)).is_ok());

    store.add_member("urn:example:col", "urn:example:a").unwrap();
    let mut fetched = store.get_collection("urn:example:col").unwrap();
    assert_eq!(fetched["first"], "urn:example:col?page=0");
    assert_eq!(fetched["last"], "urn:example:col?page=0");

    fetched["label"] = json!("Renamed");
    let updated = store
        .update_collection("urn:example:col", fetched)
        .unwrap();
    assert_eq!(updated["label"], "Renamed");
    assert_eq!(updated["total"], 1);
    assert!(validate(&updated, Some(DocumentKind::AnnotationCollection)).is_ok());
}
