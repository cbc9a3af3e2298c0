mod common;

use common::{ingest, memory_store};
use docgraph::config::StoreConfig;
use docgraph::models::NodeKind;
use docgraph::store::GraphStore;

#[tokio::test]
async fn test_results_are_ranked_by_bm25() {
    let store = memory_store().await;
    for (i, filler) in ["go go go", "python scripts", "plain prose"].iter().enumerate() {
        ingest(&store, &format!("filler-{}", i), filler).await;
    }
    ingest(&store, "dense", "rust rust rust rust").await;
    ingest(
        &store,
        "sparse",
        "rust appears once among a great many other unrelated filler words here",
    )
    .await;

    let hits = store.search("rust", None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].node.document_id, "dense");
    assert!(hits[0].score <= hits[1].score);
}

#[tokio::test]
async fn test_match_is_case_insensitive() {
    let store = memory_store().await;
    ingest(&store, "d", "# Tokio Runtime\n\nThe scheduler is work-stealing.").await;

    for query in ["tokio", "TOKIO", "Tokio"] {
        let hits = store.search(query, None).await.unwrap();
        assert_eq!(hits.len(), 1, "query {:?}", query);
        assert_eq!(hits[0].node.kind, NodeKind::Heading);
    }
}

#[tokio::test]
async fn test_terms_are_anded() {
    let store = memory_store().await;
    ingest(&store, "d", "apples and pears\n\napples only").await;

    assert_eq!(store.search("apples", None).await.unwrap().len(), 2);
    let hits = store.search("apples pears", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.start, 0);
}

#[tokio::test]
async fn test_punctuation_in_query_is_harmless() {
    let store = memory_store().await;
    ingest(&store, "d", "The work-stealing scheduler.").await;

    let hits = store.search("\"work-stealing\" OR (", None).await.unwrap();
    assert!(hits.is_empty());
    let hits = store.search("work-stealing", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(store.search("***", None).await.unwrap().is_empty());
    assert!(store.search("", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_title_matches_heading_node() {
    let store = memory_store().await;
    let built = ingest(&store, "d", "# Installation\n\nRun the installer.").await;

    let hits = store.search("installation", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.pk, built.nodes[1].pk);
    assert_eq!(hits[0].node.title.as_deref(), Some("Installation"));
}

#[tokio::test]
async fn test_snippet_highlights_terms() {
    let store = memory_store().await;
    ingest(&store, "d", "Graphs of nodes and edges.").await;

    let hits = store.search("edges", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].snippet.contains(">>>edges<<<"), "{}", hits[0].snippet);
}

#[tokio::test]
async fn test_root_is_not_indexed() {
    let store = memory_store().await;
    ingest(&store, "d", "only paragraph").await;

    let hits = store.search("paragraph", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node.kind, NodeKind::Paragraph);
}

#[tokio::test]
async fn test_limit() {
    let store = memory_store().await;
    let raw = (0..5)
        .map(|i| format!("needle number {}", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    ingest(&store, "d", &raw).await;

    assert_eq!(store.search("needle", Some(2)).await.unwrap().len(), 2);
    assert_eq!(store.search("needle", None).await.unwrap().len(), 5);
    assert!(store.search("needle", Some(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_default_limit_from_config() {
    let mut config = StoreConfig::in_memory();
    config.search.default_limit = 3;
    let store = GraphStore::connect(config).await.unwrap();

    let raw = (0..6)
        .map(|i| format!("needle {}", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    ingest(&store, "d", &raw).await;

    assert_eq!(store.search("needle", None).await.unwrap().len(), 3);
    assert_eq!(store.search("needle", Some(10)).await.unwrap().len(), 6);
}
