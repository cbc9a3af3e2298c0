//! Node persistence and lookups.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::error::{Result, StoreError};
use crate::metadata::Metadata;
use crate::models::{NewNode, Node};
use crate::store::GraphStore;

pub(crate) const NODE_COLUMNS: &str = "pk, short_id, full_id, document_id, kind, level, title, \
     start_offset, end_offset, parent_pk, metadata_json";

/// Same columns qualified with the `n.` alias, for joins.
pub(crate) const NODE_COLUMNS_N: &str = "n.pk, n.short_id, n.full_id, n.document_id, n.kind, \
     n.level, n.title, n.start_offset, n.end_offset, n.parent_pk, n.metadata_json";

pub(crate) fn node_from_row(row: &SqliteRow) -> Result<Node> {
    let kind: String = row.try_get("kind")?;
    let level: Option<i64> = row.try_get("level")?;
    let metadata_json: String = row.try_get("metadata_json")?;

    let level = level
        .map(|l| {
            u32::try_from(l).map_err(|_| StoreError::Corrupt(format!("invalid node level {}", l)))
        })
        .transpose()?;

    Ok(Node {
        pk: row.try_get("pk")?,
        short_id: row.try_get("short_id")?,
        full_id: row.try_get("full_id")?,
        document_id: row.try_get("document_id")?,
        kind: kind.parse()?,
        level,
        title: row.try_get("title")?,
        start: row.try_get("start_offset")?,
        end: row.try_get("end_offset")?,
        parent_pk: row.try_get("parent_pk")?,
        metadata: Metadata::from_json(&metadata_json)?,
    })
}

/// Insert a node row. A `parent_pk` or `document_id` that does not exist is a
/// [`StoreError::ReferentialIntegrityViolation`].
pub(crate) async fn insert_node(conn: &mut SqliteConnection, node: &NewNode) -> Result<Node> {
    if node.start > node.end {
        return Err(StoreError::InvalidInput(format!(
            "node span [{}, {}) is inverted",
            node.start, node.end
        )));
    }

    let metadata_json = node.metadata.to_json()?;
    let result = sqlx::query(
        r#"
        INSERT INTO nodes (short_id, full_id, document_id, kind, level, title,
                           start_offset, end_offset, parent_pk, metadata_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&node.short_id)
    .bind(&node.full_id)
    .bind(&node.document_id)
    .bind(node.kind.as_str())
    .bind(node.level.map(i64::from))
    .bind(&node.title)
    .bind(node.start)
    .bind(node.end)
    .bind(node.parent_pk)
    .bind(&metadata_json)
    .execute(&mut *conn)
    .await?;

    Ok(Node {
        pk: result.last_insert_rowid(),
        short_id: node.short_id.clone(),
        full_id: node.full_id.clone(),
        document_id: node.document_id.clone(),
        kind: node.kind.clone(),
        level: node.level,
        title: node.title.clone(),
        start: node.start,
        end: node.end,
        parent_pk: node.parent_pk,
        metadata: node.metadata.clone(),
    })
}

pub(crate) async fn fetch_node(conn: &mut SqliteConnection, pk: i64) -> Result<Option<Node>> {
    let row = sqlx::query(&format!("SELECT {} FROM nodes WHERE pk = ?", NODE_COLUMNS))
        .bind(pk)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(node_from_row).transpose()
}

impl GraphStore {
    pub async fn get_node(&self, pk: i64) -> Result<Option<Node>> {
        let mut conn = self.pool()?.acquire().await?;
        fetch_node(&mut conn, pk).await
    }

    pub async fn get_node_by_short_id(&self, short_id: &str) -> Result<Option<Node>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM nodes WHERE short_id = ?",
            NODE_COLUMNS
        ))
        .bind(short_id)
        .fetch_optional(self.pool()?)
        .await?;
        row.as_ref().map(node_from_row).transpose()
    }

    pub async fn get_node_by_full_id(&self, full_id: &str) -> Result<Option<Node>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM nodes WHERE full_id = ?",
            NODE_COLUMNS
        ))
        .bind(full_id)
        .fetch_optional(self.pool()?)
        .await?;
        row.as_ref().map(node_from_row).transpose()
    }

    /// All nodes of a document, ordered by byte offset (root first).
    pub async fn nodes_for_document(&self, document_id: &str) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM nodes WHERE document_id = ? ORDER BY start_offset, pk",
            NODE_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(node_from_row).collect()
    }

    /// The node's parent, or `None` for a root or an unknown key.
    pub async fn parent(&self, pk: i64) -> Result<Option<Node>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM nodes n JOIN nodes c ON c.parent_pk = n.pk WHERE c.pk = ?",
            NODE_COLUMNS_N
        ))
        .bind(pk)
        .fetch_optional(self.pool()?)
        .await?;
        row.as_ref().map(node_from_row).transpose()
    }
}
