//! Typed edge persistence and traversal.
//!
//! The builder only ever writes `contains` (parent → child) and `next`
//! (sibling → following sibling) edges. Other relation types, such as `ref`,
//! can be added through [`GraphStore::insert_edge`].

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::error::{Result, StoreError};
use crate::metadata::Metadata;
use crate::models::{Edge, Node, EDGE_CONTAINS, EDGE_NEXT};
use crate::nodes::{node_from_row, NODE_COLUMNS_N};
use crate::store::GraphStore;

fn edge_from_row(row: &SqliteRow) -> Result<Edge> {
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(Edge {
        src_pk: row.try_get("src_pk")?,
        dst_pk: row.try_get("dst_pk")?,
        edge_type: row.try_get("edge_type")?,
        weight: row.try_get("weight")?,
        metadata: Metadata::from_json(&metadata_json)?,
    })
}

/// Upsert an edge on `(src, dst, type)`.
pub(crate) async fn insert_edge(
    conn: &mut SqliteConnection,
    src_pk: i64,
    dst_pk: i64,
    edge_type: &str,
    weight: f64,
    metadata: &Metadata,
) -> Result<Edge> {
    if edge_type.is_empty() {
        return Err(StoreError::InvalidInput("edge type must not be empty".into()));
    }
    if !weight.is_finite() {
        return Err(StoreError::InvalidInput("edge weight must be finite".into()));
    }

    sqlx::query(
        r#"
        INSERT INTO edges (src_pk, dst_pk, edge_type, weight, metadata_json)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(src_pk, dst_pk, edge_type) DO UPDATE SET
            weight = excluded.weight,
            metadata_json = excluded.metadata_json
        "#,
    )
    .bind(src_pk)
    .bind(dst_pk)
    .bind(edge_type)
    .bind(weight)
    .bind(metadata.to_json()?)
    .execute(&mut *conn)
    .await?;

    Ok(Edge {
        src_pk,
        dst_pk,
        edge_type: edge_type.to_string(),
        weight,
        metadata: metadata.clone(),
    })
}

/// Delete every edge touching a node of the document.
pub(crate) async fn delete_for_document(
    conn: &mut SqliteConnection,
    document_id: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM edges
        WHERE src_pk IN (SELECT pk FROM nodes WHERE document_id = ?1)
           OR dst_pk IN (SELECT pk FROM nodes WHERE document_id = ?1)
        "#,
    )
    .bind(document_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

impl GraphStore {
    /// Add (or update) a typed edge between two existing nodes.
    pub async fn insert_edge(
        &self,
        src_pk: i64,
        dst_pk: i64,
        edge_type: &str,
        weight: f64,
        metadata: &Metadata,
    ) -> Result<Edge> {
        let mut tx = self.pool()?.begin().await?;
        let edge = insert_edge(&mut tx, src_pk, dst_pk, edge_type, weight, metadata).await?;
        tx.commit().await?;
        Ok(edge)
    }

    /// Children via outgoing `contains` edges, ordered by byte offset.
    pub async fn children(&self, pk: i64) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM edges e
            JOIN nodes n ON n.pk = e.dst_pk
            WHERE e.src_pk = ? AND e.edge_type = ?
            ORDER BY n.start_offset, n.pk
            "#,
            NODE_COLUMNS_N
        ))
        .bind(pk)
        .bind(EDGE_CONTAINS)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(node_from_row).collect()
    }

    /// Every node reachable by following `next` edges, nearest first.
    pub async fn following_siblings(&self, pk: i64) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            r#"
            WITH RECURSIVE chain(pk, depth) AS (
                SELECT dst_pk, 1 FROM edges WHERE src_pk = ?1 AND edge_type = ?2
                UNION
                SELECT e.dst_pk, c.depth + 1
                FROM edges e
                JOIN chain c ON e.src_pk = c.pk
                WHERE e.edge_type = ?2
                  AND c.depth < (SELECT COUNT(*) FROM edges WHERE edge_type = ?2)
            )
            SELECT {}
            FROM chain c
            JOIN nodes n ON n.pk = c.pk
            WHERE n.pk != ?1
            GROUP BY n.pk
            ORDER BY MIN(c.depth)
            "#,
            NODE_COLUMNS_N
        ))
        .bind(pk)
        .bind(EDGE_NEXT)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(node_from_row).collect()
    }

    pub async fn edges_of_type(&self, edge_type: &str) -> Result<Vec<Edge>> {
        let rows = sqlx::query(
            r#"
            SELECT src_pk, dst_pk, edge_type, weight, metadata_json
            FROM edges WHERE edge_type = ?
            ORDER BY src_pk, dst_pk
            "#,
        )
        .bind(edge_type)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(edge_from_row).collect()
    }

    /// Outgoing edges of any type.
    pub async fn edges_from(&self, pk: i64) -> Result<Vec<Edge>> {
        let rows = sqlx::query(
            r#"
            SELECT src_pk, dst_pk, edge_type, weight, metadata_json
            FROM edges WHERE src_pk = ?
            ORDER BY edge_type, dst_pk
            "#,
        )
        .bind(pk)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(edge_from_row).collect()
    }

    /// Incoming edges of any type.
    pub async fn edges_to(&self, pk: i64) -> Result<Vec<Edge>> {
        let rows = sqlx::query(
            r#"
            SELECT src_pk, dst_pk, edge_type, weight, metadata_json
            FROM edges WHERE dst_pk = ?
            ORDER BY edge_type, src_pk
            "#,
        )
        .bind(pk)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(edge_from_row).collect()
    }
}
