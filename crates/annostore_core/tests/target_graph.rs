use annostore_core::{
    AnnotationError, AnnotationStore, DocumentKind, DocumentStore, MemoryDocumentStore,
    StoreConfig, TargetDescriptor,
};
use serde_json::{json, Value};

const CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";

fn annotation(id: &str, target: Value) -> Value {
    json!({
        "@context": CONTEXT,
        "id": id,
        "type": "Annotation",
        "motivation": "commenting",
        "target": target,
    })
}

fn on(id: &str) -> Value {
    json!({"id": id, "type": "Annotation"})
}

fn new_store() -> AnnotationStore<MemoryDocumentStore> {
    AnnotationStore::new(MemoryDocumentStore::new())
}

fn stored_closure_ids(store: &AnnotationStore<MemoryDocumentStore>, id: &str) -> Vec<String> {
    let stored = store.store().get(DocumentKind::Annotation, id).unwrap();
    stored["targetClosure"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_str().unwrap().to_string())
        .collect()
}

fn ids_of(documents: &[Value]) -> Vec<&str> {
    documents
        .iter()
        .map(|document| document["id"].as_str().unwrap())
        .collect()
}

#[test]
fn closure_includes_transitive_targets() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:b", on("urn:example:a")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:c", on("urn:example:b")))
        .unwrap();

    assert_eq!(
        stored_closure_ids(&store, "urn:example:c"),
        vec!["urn:example:b", "urn:example:a", "urn:example:page"]
    );

    let hits = store.annotations_by_target("urn:example:page").unwrap();
    assert_eq!(
        ids_of(&hits),
        vec!["urn:example:a", "urn:example:b", "urn:example:c"]
    );
    assert!(hits.iter().all(|hit| hit.get("targetClosure").is_none()));
}

#[test]
fn update_propagates_along_the_chain() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:b", on("urn:example:a")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:d", on("urn:example:b")))
        .unwrap();

    store
        .update_annotation(
            "urn:example:a",
            annotation(
                "urn:example:a",
                json!(["urn:example:page", "urn:example:c"]),
            ),
        )
        .unwrap();

    assert!(stored_closure_ids(&store, "urn:example:b").contains(&"urn:example:c".to_string()));
    assert!(stored_closure_ids(&store, "urn:example:d").contains(&"urn:example:c".to_string()));

    let hits = store.annotations_by_target("urn:example:c").unwrap();
    assert_eq!(
        ids_of(&hits),
        vec!["urn:example:a", "urn:example:b", "urn:example:d"]
    );
}

#[test]
fn deleted_annotation_becomes_a_leaf_for_dependents() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:b", on("urn:example:a")))
        .unwrap();

    store.delete_annotation("urn:example:a").unwrap();

    let err = store.get_annotation("urn:example:a", false).unwrap_err();
    assert!(matches!(err, AnnotationError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);

    assert_eq!(stored_closure_ids(&store, "urn:example:b"), vec!["urn:example:a"]);
    assert!(store
        .annotations_by_target("urn:example:page")
        .unwrap()
        .is_empty());
    assert_eq!(
        ids_of(&store.annotations_by_target("urn:example:a").unwrap()),
        vec!["urn:example:b"]
    );

    let err = store.delete_annotation("urn:example:a").unwrap_err();
    assert!(matches!(err, AnnotationError::NotFound { .. }));
}

#[test]
fn diamond_dependents_keep_one_entry_per_target() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:b", on("urn:example:a")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:c", on("urn:example:a")))
        .unwrap();
    store
        .create_annotation(annotation(
            "urn:example:d",
            json!([on("urn:example:b"), on("urn:example:c")]),
        ))
        .unwrap();

    let sorted_closure = |id: &str| {
        let mut ids = stored_closure_ids(&store, id);
        ids.sort();
        ids
    };
    assert_eq!(
        sorted_closure("urn:example:d"),
        vec!["urn:example:a", "urn:example:b", "urn:example:c", "urn:example:page"]
    );

    store
        .update_annotation(
            "urn:example:a",
            annotation(
                "urn:example:a",
                json!(["urn:example:page", "urn:example:new"]),
            ),
        )
        .unwrap();
    let expected = vec![
        "urn:example:a",
        "urn:example:b",
        "urn:example:c",
        "urn:example:new",
        "urn:example:page",
    ];
    assert_eq!(sorted_closure("urn:example:d"), expected);

    store.delete_annotation("urn:example:b").unwrap();
    assert_eq!(sorted_closure("urn:example:d"), expected);
    assert_eq!(
        ids_of(&store.annotations_by_target("urn:example:new").unwrap()),
        vec!["urn:example:a", "urn:example:c", "urn:example:d"]
    );
}

#[test]
fn tombstoned_ids_cannot_be_recreated() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    let err = store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap_err();
    assert!(matches!(err, AnnotationError::AlreadyExists { .. }));

    store.delete_annotation("urn:example:a").unwrap();
    let err = store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[test]
fn direct_self_target_is_rejected_on_create_and_update() {
    let store = new_store();
    let err = store
        .create_annotation(annotation("urn:example:a", on("urn:example:a")))
        .unwrap_err();
    assert!(matches!(err, AnnotationError::SelfTarget { ref id } if id == "urn:example:a"));
    assert_eq!(err.status_code(), 400);

    store
        .create_annotation(annotation("urn:example:b", json!("urn:example:page")))
        .unwrap();
    let err = store
        .update_annotation(
            "urn:example:b",
            annotation("urn:example:b", json!(["urn:example:page", "urn:example:b"])),
        )
        .unwrap_err();
    assert!(matches!(err, AnnotationError::SelfTarget { .. }));
}

#[test]
fn multi_hop_cycle_is_rejected() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:b", on("urn:example:a")))
        .unwrap();

    let err = store
        .update_annotation(
            "urn:example:a",
            annotation("urn:example:a", on("urn:example:b")),
        )
        .unwrap_err();
    match err {
        AnnotationError::TargetCycle { path } => {
            assert_eq!(path, vec!["urn:example:a", "urn:example:b", "urn:example:a"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        stored_closure_ids(&store, "urn:example:a"),
        vec!["urn:example:page"]
    );
}

#[test]
fn missing_annotation_target_is_not_found() {
    let store = new_store();
    let err = store
        .create_annotation(annotation("urn:example:b", on("urn:example:missing")))
        .unwrap_err();
    match err {
        AnnotationError::NotFound { kind, id } => {
            assert_eq!(kind, DocumentKind::Annotation);
            assert_eq!(id, "urn:example:missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn closure_is_deterministic_and_idempotent() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:b", json!("urn:example:other")))
        .unwrap();
    store
        .create_annotation(annotation(
            "urn:example:c",
            json!([on("urn:example:a"), on("urn:example:b"), on("urn:example:a")]),
        ))
        .unwrap();

    let stored = store.store().get(DocumentKind::Annotation, "urn:example:c").unwrap();
    let (entity, stored_closure) = annostore_core::Annotation::from_stored(stored).unwrap();
    let first = store.compute_closure(&entity).unwrap();
    let second = store.compute_closure(&entity).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, stored_closure);
    assert_eq!(
        first,
        vec![
            TargetDescriptor::typed("urn:example:a", "Annotation"),
            TargetDescriptor::typed("urn:example:b", "Annotation"),
            TargetDescriptor::untyped("urn:example:page"),
            TargetDescriptor::untyped("urn:example:other"),
        ]
    );
    assert_eq!(store.propagate_change("urn:example:a").unwrap(), 0);
}

#[test]
fn traversal_depth_is_bounded() {
    let config = StoreConfig {
        max_graph_depth: 2,
        ..StoreConfig::default()
    };
    let store = AnnotationStore::with_config(MemoryDocumentStore::new(), config);
    store
        .create_annotation(annotation("urn:example:a0", json!("urn:example:page")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:a1", on("urn:example:a0")))
        .unwrap();
    store
        .create_annotation(annotation("urn:example:a2", on("urn:example:a1")))
        .unwrap();

    let err = store
        .create_annotation(annotation("urn:example:a3", on("urn:example:a2")))
        .unwrap_err();
    assert!(matches!(err, AnnotationError::GraphTooDeep { limit: 2, .. }));
}

#[test]
fn searches_refresh_only_after_writes() {
    let store = new_store();
    store
        .create_annotation(annotation("urn:example:a", json!("urn:example:page")))
        .unwrap();
    assert!(store.needs_refresh());
    assert_eq!(store.store().pending_writes(), 1);

    assert_eq!(store.annotations_by_target("urn:example:page").unwrap().len(), 1);
    assert!(!store.needs_refresh());
    assert_eq!(store.store().refresh_count(), 1);

    store.annotations_by_target("urn:example:page").unwrap();
    store.get_annotation("urn:example:a", false).unwrap();
    assert_eq!(store.store().refresh_count(), 1);

    store
        .create_annotation(annotation("urn:example:b", on("urn:example:a")))
        .unwrap();
    assert_eq!(store.annotations_by_target("urn:example:page").unwrap().len(), 2);
    assert_eq!(store.store().refresh_count(), 2);
}

#[test]
fn update_keeps_identity_rules() {
    let store = new_store();
    let mut document = annotation("urn:example:a", json!("urn:example:page"));
    document["permissions"] = json!({"owner": "urn:example:user"});
    let created = store.create_annotation(document).unwrap();
    let created_at = created["created"].as_str().unwrap().to_string();
    assert!(created.get("permissions").is_none());

    let err = store
        .update_annotation(
            "urn:example:a",
            annotation("urn:example:other", json!("urn:example:page")),
        )
        .unwrap_err();
    assert!(matches!(err, AnnotationError::IdMismatch { .. }));

    let updated = store
        .update_annotation(
            "urn:example:a",
            annotation("urn:example:a", json!("urn:example:page2")),
        )
        .unwrap();
    assert_eq!(updated["created"], created_at.as_str());
    assert!(updated["modified"].is_string());

    let with_permissions = store.get_annotation("urn:example:a", true).unwrap();
    assert_eq!(with_permissions["permissions"]["owner"], "urn:example:user");
    assert_eq!(stored_closure_ids(&store, "urn:example:a"), vec!["urn:example:page2"]);

    let err = store
        .update_annotation("urn:example:missing", annotation("urn:example:missing", json!("urn:example:x")))
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn generated_ids_are_urn_uuids() {
    let store = new_store();
    let created = store
        .create_annotation(json!({
            "@context": CONTEXT,
            "type": "Annotation",
            "target": "urn:example:page",
        }))
        .unwrap();
    let id = created["id"].as_str().unwrap();
    assert!(id.starts_with("urn:uuid:"));
    assert!(created["created"].is_string());
    assert_eq!(store.get_annotation(id, false).unwrap(), created);
}

#[test]
fn listing_and_batch_lookup_skip_tombstones() {
    let config = StoreConfig {
        page_size: 2,
        ..StoreConfig::default()
    };
    let store = AnnotationStore::with_config(MemoryDocumentStore::new(), config);
    for id in ["urn:example:a", "urn:example:b", "urn:example:c"] {
        store
            .create_annotation(annotation(id, json!("urn:example:page")))
            .unwrap();
    }
    store.delete_annotation("urn:example:b").unwrap();

    let first = store.list_annotations(0).unwrap();
    assert_eq!(first.total, 2);
    assert_eq!(ids_of(&first.annotations), vec!["urn:example:a", "urn:example:c"]);
    assert!(store.list_annotations(1).unwrap().annotations.is_empty());

    let found = store
        .annotations_by_ids(["urn:example:c", "urn:example:b", "urn:example:none", "urn:example:a"])
        .unwrap();
    assert_eq!(ids_of(&found), vec!["urn:example:c", "urn:example:a"]);
}
