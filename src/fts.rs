//! Full-text index over live nodes.
//!
//! Backed by the FTS5 table `nodes_fts` whose rowid is the node's `pk`.
//! Entries are written by the graph builder and removed by the document
//! cascade in the same transaction as the node rows, so a hit always joins to
//! a live node.
//!
//! # Query handling
//!
//! User input is split into alphanumeric terms, lowercased, and each term is
//! quoted before being handed to `MATCH`, giving an implicit AND of terms.
//! Punctuation never reaches the FTS5 query parser.
//!
//! ```rust
//! use docgraph::fts::build_match_query;
//!
//! assert_eq!(build_match_query("Rust: async-IO"), Some("\"rust\" \"async\" \"io\"".to_string()));
//! assert_eq!(build_match_query("--- ..."), None);
//! ```
//!
//! # Ranking
//!
//! Scores come from FTS5's `bm25()`; lower is more relevant and results are
//! returned in ascending score order.

use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::error::Result;
use crate::models::SearchHit;
use crate::nodes::{node_from_row, NODE_COLUMNS_N};
use crate::store::GraphStore;

/// Turn free text into an FTS5 `MATCH` expression, or `None` if it has no terms.
pub fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Add one entry keyed by the node's pk.
pub(crate) async fn index(
    conn: &mut SqliteConnection,
    node_pk: i64,
    title: Option<&str>,
    text: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO nodes_fts (rowid, title, body) VALUES (?, ?, ?)")
        .bind(node_pk)
        .bind(title.unwrap_or(""))
        .bind(text)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Remove every entry whose node belongs to the document.
///
/// Must run before the node rows are deleted, since the entries are located
/// through `nodes`.
pub(crate) async fn remove_for_document(
    conn: &mut SqliteConnection,
    document_id: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM nodes_fts WHERE rowid IN (SELECT pk FROM nodes WHERE document_id = ?)",
    )
    .bind(document_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

impl GraphStore {
    /// Ranked full-text search over node titles and text.
    ///
    /// `limit` defaults to `search.default_limit` from the configuration.
    pub async fn search(&self, query: &str, limit: Option<i64>) -> Result<Vec<SearchHit>> {
        let Some(match_query) = build_match_query(query) else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(self.config().search.default_limit).max(0);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {},
                   bm25(nodes_fts) AS score,
                   snippet(nodes_fts, 1, '>>>', '<<<', '...', 24) AS snippet
            FROM nodes_fts
            JOIN nodes n ON n.pk = nodes_fts.rowid
            WHERE nodes_fts MATCH ?
            ORDER BY score, n.pk
            LIMIT ?
            "#,
            NODE_COLUMNS_N
        ))
        .bind(&match_query)
        .bind(limit)
        .fetch_all(self.pool()?)
        .await?;

        debug!(query = %match_query, hits = rows.len(), "Full-text search");

        rows.iter()
            .map(|row| -> Result<SearchHit> {
                Ok(SearchHit {
                    node: node_from_row(row)?,
                    score: row.try_get("score")?,
                    snippet: row.try_get("snippet")?,
                })
            })
            .collect()
    }
}
