//! Row counts across the store.
//!
//! A quick way to confirm that ingestion, deletes and cascades left the
//! tables in the expected shape.

use sqlx::Row;

use crate::error::Result;
use crate::models::StoreStats;
use crate::store::GraphStore;

impl GraphStore {
    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM documents)   AS documents,
                (SELECT COUNT(*) FROM nodes)       AS nodes,
                (SELECT COUNT(*) FROM edges)       AS edges,
                (SELECT COUNT(*) FROM nodes_fts)   AS fts_entries,
                (SELECT COUNT(*) FROM embeddings)  AS embeddings,
                (SELECT COUNT(*) FROM collections) AS collections,
                (SELECT COUNT(*) FROM topics)      AS topics
            "#,
        )
        .fetch_one(self.pool()?)
        .await?;

        Ok(StoreStats {
            documents: row.try_get("documents")?,
            nodes: row.try_get("nodes")?,
            edges: row.try_get("edges")?,
            fts_entries: row.try_get("fts_entries")?,
            embeddings: row.try_get("embeddings")?,
            collections: row.try_get("collections")?,
            topics: row.try_get("topics")?,
        })
    }
}
