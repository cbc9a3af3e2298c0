//! Document registration, dedup and cascading delete.

mod common;

use common::{blocks_for, count, ingest, memory_store};
use docgraph::documents::content_sha256;
use docgraph::error::StoreError;
use docgraph::metadata::Metadata;
use docgraph::models::{NewDocument, RegisterOutcome, EDGE_CONTAINS};
use sha2::{Digest, Sha256};

#[tokio::test]
async fn test_raw_bytes_and_hash_are_stored() {
    let store = memory_store().await;
    let raw = "# Title\n\nSome text.\r\n\u{00e9}";
    let built = store
        .build_document(
            &NewDocument::new("d", raw).with_source_path("notes/d.md"),
            &blocks_for(raw),
            false,
        )
        .await
        .unwrap();
    assert_eq!(built.outcome, RegisterOutcome::Created);

    let doc = store.get_document("d").await.unwrap().unwrap();
    assert_eq!(doc.raw, raw.as_bytes());
    assert_eq!(doc.source_path.as_deref(), Some("notes/d.md"));
    assert_eq!(doc.sha256, hex::encode(Sha256::digest(raw.as_bytes())));
    assert_eq!(doc.sha256, content_sha256(raw.as_bytes()));
    assert!(doc.created_at > 0);
}

#[tokio::test]
async fn test_duplicate_with_identical_bytes() {
    let store = memory_store().await;
    ingest(&store, "d", "# Title\n\nSome text.").await;

    let err = store
        .build_document(
            &NewDocument::new("d", "# Title\n\nSome text."),
            &blocks_for("# Title\n\nSome text."),
            false,
        )
        .await
        .unwrap_err();
    assert!(err.is_duplicate_document());
    assert!(matches!(
        err,
        StoreError::DuplicateDocument { sha256_match: true, ref document_id } if document_id == "d"
    ));
    assert_eq!(count(&store, "nodes").await, 3);
}

#[tokio::test]
async fn test_duplicate_with_changed_bytes() {
    let store = memory_store().await;
    ingest(&store, "d", "# Title\n\nSome text.").await;

    let err = store
        .register_document(&NewDocument::new("d", "# Title\n\nOther text."), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DuplicateDocument { sha256_match: false, .. }
    ));

    // The stored copy is untouched.
    let doc = store.get_document("d").await.unwrap().unwrap();
    assert_eq!(doc.raw, b"# Title\n\nSome text.");
}

#[tokio::test]
async fn test_force_replaces_the_graph() {
    let store = memory_store().await;
    ingest(&store, "d", "# Old\n\nalpha words").await;

    let raw = "# New\n\nbeta words";
    let built = store
        .build_document(&NewDocument::new("d", raw), &blocks_for(raw), true)
        .await
        .unwrap();
    assert_eq!(built.outcome, RegisterOutcome::Replaced);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.nodes, 3);
    assert_eq!(stats.edges, 2);
    assert_eq!(stats.fts_entries, 2);

    assert!(store.search("alpha", None).await.unwrap().is_empty());
    assert_eq!(store.search("beta", None).await.unwrap().len(), 1);
    assert_eq!(store.get_document("d").await.unwrap().unwrap().raw, raw.as_bytes());
}

#[tokio::test]
async fn test_register_without_graph() {
    let store = memory_store().await;
    let outcome = store
        .register_document(&NewDocument::new("bare", "just bytes"), false)
        .await
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Created);
    assert!(store.nodes_for_document("bare").await.unwrap().is_empty());

    let outcome = store
        .register_document(&NewDocument::new("bare", "new bytes"), true)
        .await
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Replaced);
}

#[tokio::test]
async fn test_empty_id_is_rejected() {
    let store = memory_store().await;
    let err = store
        .register_document(&NewDocument::new("  ", "x"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_delete_removes_everything_built_from_the_document() {
    let store = memory_store().await;
    ingest(&store, "d", "# A\n\none\n\n## B\n\ntwo\n\n# C").await;
    assert!(count(&store, "edges").await > 0);

    assert!(store.delete_document("d").await.unwrap());

    assert!(store.get_document("d").await.unwrap().is_none());
    assert_eq!(count(&store, "nodes").await, 0);
    assert_eq!(count(&store, "edges").await, 0);
    assert_eq!(count(&store, "nodes_fts").await, 0);
    assert!(store.search("one", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_missing_document() {
    let store = memory_store().await;
    ingest(&store, "keep", "# Keep").await;

    assert!(!store.delete_document("missing").await.unwrap());
    assert_eq!(count(&store, "nodes").await, 2);
}

#[tokio::test]
async fn test_delete_leaves_other_documents_intact() {
    let store = memory_store().await;
    let a = ingest(&store, "a", "# Shared\n\nalpha text").await;
    let b = ingest(&store, "b", "# Shared\n\nbeta text").await;

    // Cross-document reference edge in both directions.
    store
        .insert_edge(a.nodes[2].pk, b.nodes[2].pk, "ref", 0.5, &Metadata::new())
        .await
        .unwrap();
    store
        .insert_edge(b.nodes[1].pk, a.nodes[1].pk, "ref", 0.5, &Metadata::new())
        .await
        .unwrap();

    assert!(store.delete_document("a").await.unwrap());

    assert!(store.edges_of_type("ref").await.unwrap().is_empty());
    assert_eq!(store.nodes_for_document("b").await.unwrap().len(), 3);
    assert_eq!(store.edges_of_type(EDGE_CONTAINS).await.unwrap().len(), 2);

    let hits = store.search("shared", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.document_id, "b");
}

#[tokio::test]
async fn test_reingest_after_delete() {
    let store = memory_store().await;
    let first = ingest(&store, "d", "# Title\n\nSome text.").await;
    store.delete_document("d").await.unwrap();
    let second = ingest(&store, "d", "# Title\n\nSome text.").await;

    assert_eq!(second.outcome, RegisterOutcome::Created);
    // Same inputs, freed ids: allocation is reproducible.
    assert_eq!(first.root.full_id, second.root.full_id);
}

#[tokio::test]
async fn test_list_documents() {
    let store = memory_store().await;
    ingest(&store, "one", "# One").await;
    store
        .register_document(&NewDocument::new("two", "22"), false)
        .await
        .unwrap();

    let docs = store.list_documents().await.unwrap();
    assert_eq!(docs.len(), 2);
    let two = docs.iter().find(|d| d.id == "two").unwrap();
    assert_eq!(two.byte_len, 2);
    assert_eq!(two.sha256, content_sha256(b"22"));
}
