//! Collections: named, non-exclusive groups of documents and nodes, plus one
//! settings row per project collection.
//!
//! Members reference their target by identifier string only, so the same
//! document or node can sit in any number of collections and membership
//! survives re-ingestion.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::metadata::Metadata;
use crate::models::{
    Collection, CollectionKind, CollectionMember, ProjectSettings, TargetType,
};
use crate::store::GraphStore;

fn collection_from_row(row: &SqliteRow) -> Result<Collection> {
    let kind: String = row.try_get("kind")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(Collection {
        id: row.try_get("id")?,
        kind: kind.parse()?,
        name: row.try_get("name")?,
        metadata: Metadata::from_json(&metadata_json)?,
    })
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidInput("collection name must not be empty".into()));
    }
    Ok(())
}

impl GraphStore {
    /// Create a collection. A taken name is a [`StoreError::UniquenessViolation`].
    pub async fn create_collection(
        &self,
        kind: CollectionKind,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Collection> {
        check_name(name)?;
        let id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO collections (id, kind, name, metadata_json) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(kind.as_str())
            .bind(name)
            .bind(metadata.to_json()?)
            .execute(self.pool()?)
            .await?;

        info!(collection_id = %id, name, kind = kind.as_str(), "Created collection");
        Ok(Collection {
            id,
            kind,
            name: name.to_string(),
            metadata: metadata.clone(),
        })
    }

    /// Create the collection, or update kind and metadata of the one with this name.
    ///
    /// Changing a project collection to another kind drops its settings row.
    pub async fn upsert_collection(
        &self,
        kind: CollectionKind,
        name: &str,
        metadata: &Metadata,
    ) -> Result<Collection> {
        check_name(name)?;
        let mut tx = self.pool()?.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO collections (id, kind, name, metadata_json) VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                kind = excluded.kind,
                metadata_json = excluded.metadata_json
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(kind.as_str())
        .bind(name)
        .bind(metadata.to_json()?)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT id, kind, name, metadata_json FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;
        let collection = collection_from_row(&row)?;

        // Settings only exist for project collections.
        if collection.kind != CollectionKind::Project {
            let dropped = sqlx::query("DELETE FROM project_settings WHERE collection_id = ?")
                .bind(&collection.id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if dropped > 0 {
                info!(
                    collection_id = %collection.id,
                    kind = collection.kind.as_str(),
                    "Dropped project settings after kind change"
                );
            }
        }

        tx.commit().await?;
        Ok(collection)
    }

    pub async fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let row = sqlx::query("SELECT id, kind, name, metadata_json FROM collections WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool()?)
            .await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    pub async fn get_collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let row = sqlx::query("SELECT id, kind, name, metadata_json FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool()?)
            .await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    /// Collections ordered by name, optionally restricted to one kind.
    pub async fn list_collections(&self, kind: Option<&CollectionKind>) -> Result<Vec<Collection>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT id, kind, name, metadata_json FROM collections WHERE kind = ? ORDER BY name",
                )
                .bind(kind.as_str())
                .fetch_all(self.pool()?)
                .await?
            }
            None => {
                sqlx::query("SELECT id, kind, name, metadata_json FROM collections ORDER BY name")
                    .fetch_all(self.pool()?)
                    .await?
            }
        };
        rows.iter().map(collection_from_row).collect()
    }

    /// Delete a collection with its members and settings.
    pub async fn delete_collection(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool()?.begin().await?;

        sqlx::query("DELETE FROM project_settings WHERE collection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collection_members WHERE collection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }
        tx.commit().await?;
        info!(collection_id = id, "Deleted collection");
        Ok(true)
    }

    /// Add a member. Adding an existing member is a no-op.
    pub async fn add_member(
        &self,
        collection_id: &str,
        member_type: TargetType,
        member_pk: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_members (collection_id, member_type, member_pk)
            VALUES (?, ?, ?)
            ON CONFLICT(collection_id, member_type, member_pk) DO NOTHING
            "#,
        )
        .bind(collection_id)
        .bind(member_type.as_str())
        .bind(member_pk)
        .execute(self.pool()?)
        .await?;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        collection_id: &str,
        member_type: TargetType,
        member_pk: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM collection_members WHERE collection_id = ? AND member_type = ? AND member_pk = ?",
        )
        .bind(collection_id)
        .bind(member_type.as_str())
        .bind(member_pk)
        .execute(self.pool()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_members(&self, collection_id: &str) -> Result<Vec<CollectionMember>> {
        let rows = sqlx::query(
            r#"
            SELECT collection_id, member_type, member_pk
            FROM collection_members
            WHERE collection_id = ?
            ORDER BY member_type, member_pk
            "#,
        )
        .bind(collection_id)
        .fetch_all(self.pool()?)
        .await?;

        rows.iter()
            .map(|row| -> Result<CollectionMember> {
                let member_type: String = row.try_get("member_type")?;
                Ok(CollectionMember {
                    collection_id: row.try_get("collection_id")?,
                    member_type: member_type.parse()?,
                    member_pk: row.try_get("member_pk")?,
                })
            })
            .collect()
    }

    /// Collections containing the given member, ordered by name.
    pub async fn collections_for_member(
        &self,
        member_type: TargetType,
        member_pk: &str,
    ) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.kind, c.name, c.metadata_json
            FROM collections c
            JOIN collection_members m ON m.collection_id = c.id
            WHERE m.member_type = ? AND m.member_pk = ?
            ORDER BY c.name
            "#,
        )
        .bind(member_type.as_str())
        .bind(member_pk)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(collection_from_row).collect()
    }

    /// Create or replace the defaults of a project collection.
    pub async fn upsert_project_settings(
        &self,
        collection_id: &str,
        defaults: &Metadata,
    ) -> Result<ProjectSettings> {
        let mut tx = self.pool()?.begin().await?;

        let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM collections WHERE id = ?")
            .bind(collection_id)
            .fetch_optional(&mut *tx)
            .await?;
        match kind.as_deref().map(str::parse::<CollectionKind>).transpose()? {
            None => {
                return Err(StoreError::ReferentialIntegrityViolation(format!(
                    "collection '{}' does not exist",
                    collection_id
                )))
            }
            Some(CollectionKind::Project) => {}
            Some(other) => {
                return Err(StoreError::InvalidInput(format!(
                    "settings require a project collection, '{}' is '{}'",
                    collection_id,
                    other.as_str()
                )))
            }
        }

        let updated_at = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO project_settings (collection_id, defaults_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(collection_id) DO UPDATE SET
                defaults_json = excluded.defaults_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection_id)
        .bind(defaults.to_json()?)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ProjectSettings {
            collection_id: collection_id.to_string(),
            defaults: defaults.clone(),
            updated_at,
        })
    }

    pub async fn get_project_settings(&self, collection_id: &str) -> Result<Option<ProjectSettings>> {
        let row = sqlx::query(
            "SELECT collection_id, defaults_json, updated_at FROM project_settings WHERE collection_id = ?",
        )
        .bind(collection_id)
        .fetch_optional(self.pool()?)
        .await?;

        row.map(|r| -> Result<ProjectSettings> {
            let defaults_json: String = r.try_get("defaults_json")?;
            Ok(ProjectSettings {
                collection_id: r.try_get("collection_id")?,
                defaults: Metadata::from_json(&defaults_json)?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
    }
}
