//! Topics: named, weighted tags on documents and nodes.
//!
//! The link weight only ranks results; a target carries at most one link per
//! topic and re-tagging updates its weight.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::metadata::Metadata;
use crate::models::{TargetType, Topic, TopicLink};
use crate::store::GraphStore;

fn topic_from_row(row: &SqliteRow) -> Result<Topic> {
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(Topic {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        metadata: Metadata::from_json(&metadata_json)?,
    })
}

fn link_from_row(row: &SqliteRow) -> Result<TopicLink> {
    let target_type: String = row.try_get("target_type")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(TopicLink {
        topic_id: row.try_get("topic_id")?,
        target_type: target_type.parse()?,
        target_pk: row.try_get("target_pk")?,
        weight: row.try_get("weight")?,
        metadata: Metadata::from_json(&metadata_json)?,
    })
}

impl GraphStore {
    /// Create a topic. A taken name is a [`StoreError::UniquenessViolation`].
    pub async fn create_topic(&self, name: &str, metadata: &Metadata) -> Result<Topic> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("topic name must not be empty".into()));
        }
        let id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO topics (id, name, metadata_json) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(metadata.to_json()?)
            .execute(self.pool()?)
            .await?;

        info!(topic_id = %id, name, "Created topic");
        Ok(Topic {
            id,
            name: name.to_string(),
            metadata: metadata.clone(),
        })
    }

    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        let row = sqlx::query("SELECT id, name, metadata_json FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?;
        row.as_ref().map(topic_from_row).transpose()
    }

    pub async fn get_topic_by_name(&self, name: &str) -> Result<Option<Topic>> {
        let row = sqlx::query("SELECT id, name, metadata_json FROM topics WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool()?)
            .await?;
        row.as_ref().map(topic_from_row).transpose()
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query("SELECT id, name, metadata_json FROM topics ORDER BY name")
            .fetch_all(self.pool()?)
            .await?;
        rows.iter().map(topic_from_row).collect()
    }

    /// Delete a topic and all of its links.
    pub async fn delete_topic(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool()?.begin().await?;

        sqlx::query("DELETE FROM topic_links WHERE topic_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }
        tx.commit().await?;
        info!(topic_id = id, "Deleted topic");
        Ok(true)
    }

    /// Link a topic to a target, or update the weight and metadata of an
    /// existing link.
    pub async fn tag(
        &self,
        topic_id: &str,
        target_type: TargetType,
        target_pk: &str,
        weight: f64,
        metadata: &Metadata,
    ) -> Result<TopicLink> {
        if !weight.is_finite() {
            return Err(StoreError::InvalidInput("topic weight must be finite".into()));
        }

        sqlx::query(
            r#"
            INSERT INTO topic_links (topic_id, target_type, target_pk, weight, metadata_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(topic_id, target_type, target_pk) DO UPDATE SET
                weight = excluded.weight,
                metadata_json = excluded.metadata_json
            "#,
        )
        .bind(topic_id)
        .bind(target_type.as_str())
        .bind(target_pk)
        .bind(weight)
        .bind(metadata.to_json()?)
        .execute(self.pool()?)
        .await?;

        Ok(TopicLink {
            topic_id: topic_id.to_string(),
            target_type,
            target_pk: target_pk.to_string(),
            weight,
            metadata: metadata.clone(),
        })
    }

    pub async fn untag(
        &self,
        topic_id: &str,
        target_type: TargetType,
        target_pk: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM topic_links WHERE topic_id = ? AND target_type = ? AND target_pk = ?",
        )
        .bind(topic_id)
        .bind(target_type.as_str())
        .bind(target_pk)
        .execute(self.pool()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Topics on a target with their weights, heaviest first, ties by name.
    pub async fn list_topics_for_target(
        &self,
        target_type: TargetType,
        target_pk: &str,
    ) -> Result<Vec<(Topic, f64)>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.metadata_json, l.weight
            FROM topic_links l
            JOIN topics t ON t.id = l.topic_id
            WHERE l.target_type = ? AND l.target_pk = ?
            ORDER BY l.weight DESC, t.name ASC
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_pk)
        .fetch_all(self.pool()?)
        .await?;

        rows.iter()
            .map(|row| -> Result<(Topic, f64)> {
                Ok((topic_from_row(row)?, row.try_get("weight")?))
            })
            .collect()
    }

    /// Links of a topic, heaviest first, ties by target identifier.
    pub async fn list_targets_for_topic(&self, topic_id: &str) -> Result<Vec<TopicLink>> {
        let rows = sqlx::query(
            r#"
            SELECT topic_id, target_type, target_pk, weight, metadata_json
            FROM topic_links
            WHERE topic_id = ?
            ORDER BY weight DESC, target_pk ASC, target_type ASC
            "#,
        )
        .bind(topic_id)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(link_from_row).collect()
    }
}
