//! Shared helpers for integration tests.

#![allow(dead_code)]

use docgraph::config::StoreConfig;
use docgraph::models::{Block, BuiltGraph, NewDocument};
use docgraph::store::GraphStore;

/// Fresh in-memory store at the latest schema.
pub async fn memory_store() -> GraphStore {
    GraphStore::connect(StoreConfig::in_memory())
        .await
        .expect("open in-memory store")
}

/// Minimal stand-in for the upstream tokenizer.
///
/// Splits on blank lines; `#` runs become headings, ``` fences become code
/// blocks (no blank lines inside fences), everything else is a paragraph.
pub fn blocks_for(raw: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    for part in raw.split("\n\n") {
        let start = offset;
        offset = start + part.len() + 2;

        let trimmed = part.trim_end_matches('\n');
        if trimmed.trim().is_empty() {
            continue;
        }
        let end = start + trimmed.len();

        if trimmed.starts_with('#') {
            let level = trimmed.chars().take_while(|c| *c == '#').count();
            let title = trimmed[level..].trim();
            blocks.push(Block::heading(level as u32, title, start, end));
        } else if let Some(rest) = trimmed.strip_prefix("```") {
            let lang = rest.lines().next().unwrap_or("").trim();
            let lang = if lang.is_empty() { None } else { Some(lang) };
            blocks.push(Block::code_block(lang, start, end));
        } else {
            blocks.push(Block::paragraph(start, end));
        }
    }
    blocks
}

/// Tokenize and build `raw` as document `id`.
pub async fn ingest(store: &GraphStore, id: &str, raw: &str) -> BuiltGraph {
    store
        .build_document(&NewDocument::new(id, raw), &blocks_for(raw), false)
        .await
        .expect("build document")
}

/// Row count of an arbitrary table.
pub async fn count(store: &GraphStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool().unwrap())
        .await
        .unwrap()
}
