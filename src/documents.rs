//! Content-addressed document registration and cascading delete.
//!
//! A document's identity for dedup is the SHA-256 of its exact raw bytes.
//! Registering an id that already exists is a caller error unless `force`
//! is set:
//!
//! | Existing row | Same bytes | `force` | Result |
//! |--------------|------------|---------|--------|
//! | no  | –   | –     | `Created` |
//! | yes | yes | false | `DuplicateDocument { sha256_match: true }` |
//! | yes | no  | false | `DuplicateDocument { sha256_match: false }` |
//! | yes | –   | true  | old graph dropped, `Replaced` |
//!
//! Deleting a document removes its FTS entries, every edge touching its
//! nodes, the nodes, and the document row in one transaction.

use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};

use crate::edges;
use crate::error::{Result, StoreError};
use crate::fts;
use crate::models::{Document, DocumentSummary, NewDocument, RegisterOutcome};
use crate::store::GraphStore;

/// Lowercase hex SHA-256 of the raw bytes.
pub fn content_sha256(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}

/// Register a document row, dropping the previous graph on a forced replace.
pub(crate) async fn register(
    conn: &mut SqliteConnection,
    doc: &NewDocument,
    force: bool,
) -> Result<RegisterOutcome> {
    if doc.id.trim().is_empty() {
        return Err(StoreError::InvalidInput("document id must not be empty".into()));
    }

    let sha256 = content_sha256(&doc.raw);

    let existing: Option<String> = sqlx::query_scalar("SELECT sha256 FROM documents WHERE id = ?")
        .bind(&doc.id)
        .fetch_optional(&mut *conn)
        .await?;

    let outcome = match existing {
        None => RegisterOutcome::Created,
        Some(existing_sha) => {
            let sha256_match = existing_sha == sha256;
            if !force {
                debug!(document_id = %doc.id, sha256_match, "Rejected duplicate document");
                return Err(StoreError::DuplicateDocument {
                    document_id: doc.id.clone(),
                    sha256_match,
                });
            }
            delete_graph(conn, &doc.id).await?;
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(&doc.id)
                .execute(&mut *conn)
                .await?;
            RegisterOutcome::Replaced
        }
    };

    sqlx::query(
        "INSERT INTO documents (id, source_path, sha256, created_at, raw) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&doc.id)
    .bind(&doc.source_path)
    .bind(&sha256)
    .bind(chrono::Utc::now().timestamp())
    .bind(&doc.raw)
    .execute(&mut *conn)
    .await?;

    info!(document_id = %doc.id, ?outcome, bytes = doc.raw.len(), "Registered document");
    Ok(outcome)
}

/// Remove FTS entries, edges and nodes of a document. The document row stays.
pub(crate) async fn delete_graph(conn: &mut SqliteConnection, document_id: &str) -> Result<()> {
    let fts_removed = fts::remove_for_document(conn, document_id).await?;
    let edges_removed = edges::delete_for_document(conn, document_id).await?;
    let nodes_removed = sqlx::query("DELETE FROM nodes WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    debug!(
        document_id,
        fts_removed, edges_removed, nodes_removed, "Dropped document graph"
    );
    Ok(())
}

fn summary_from_row(row: &SqliteRow) -> Result<DocumentSummary> {
    Ok(DocumentSummary {
        id: row.try_get("id")?,
        source_path: row.try_get("source_path")?,
        sha256: row.try_get("sha256")?,
        created_at: row.try_get("created_at")?,
        byte_len: row.try_get("byte_len")?,
    })
}

impl GraphStore {
    /// Register a document without building a graph for it.
    pub async fn register_document(
        &self,
        doc: &NewDocument,
        force: bool,
    ) -> Result<RegisterOutcome> {
        let mut tx = self.pool()?.begin().await?;
        let outcome = register(&mut tx, doc, force).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Delete a document and everything built from it.
    ///
    /// Returns `false`, with no effect, when the document does not exist.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let mut tx = self.pool()?.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?)")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Ok(false);
        }

        delete_graph(&mut tx, document_id).await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(document_id, "Deleted document");
        Ok(true)
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, source_path, sha256, created_at, raw FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(self.pool()?)
        .await?;

        row.map(|r| -> Result<Document> {
            Ok(Document {
                id: r.try_get("id")?,
                source_path: r.try_get("source_path")?,
                sha256: r.try_get("sha256")?,
                created_at: r.try_get("created_at")?,
                raw: r.try_get("raw")?,
            })
        })
        .transpose()
    }

    /// All documents, newest first, without their raw bytes.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_path, sha256, created_at, length(raw) AS byte_len
            FROM documents
            ORDER BY created_at DESC, id
            "#,
        )
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_sha256_known_vector() {
        assert_eq!(
            content_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_sha256_empty() {
        assert_eq!(
            content_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
