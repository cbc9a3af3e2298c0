//! Versioned schema management.
//!
//! Migrations are applied in ascending version order. Each step runs its DDL
//! and records itself in `schema_migrations` inside one transaction, so a
//! failed step leaves neither its tables nor its version row behind.
//!
//! | Version | Tables |
//! |---------|--------|
//! | 1 | `documents`, `nodes`, `edges`, `nodes_fts` (FTS5) |
//! | 2 | `embeddings` |
//! | 3 | `collections`, `collection_members`, `topics`, `topic_links`, `project_settings` |

use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::store::GraphStore;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents and graph",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "embeddings",
        sql: SCHEMA_V2,
    },
    Migration {
        version: 3,
        name: "collections and topics",
        sql: SCHEMA_V3,
    },
];

/// Latest schema version this build knows about.
pub const LATEST_VERSION: i64 = 3;

/// Pragmas readable through [`GraphStore::get_runtime_property`].
const READABLE_PRAGMAS: &[&str] = &[
    "journal_mode",
    "foreign_keys",
    "temp_store",
    "synchronous",
    "busy_timeout",
    "page_size",
    "encoding",
    "user_version",
];

/// Apply every migration newer than the recorded version. Returns the
/// resulting version.
pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<i64> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current = current_version(pool).await?;
    debug!(current, target = LATEST_VERSION, "Checking schema migrations");

    if current > LATEST_VERSION {
        warn!(
            current,
            latest = LATEST_VERSION,
            "Database schema is newer than this build"
        );
        return Ok(current);
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply_migration(pool, migration).await?;
    }

    current_version(pool).await
}

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let failed = |e: sqlx::Error| StoreError::Migration {
        version: migration.version,
        message: e.to_string(),
    };

    let mut tx = pool.begin().await?;

    sqlx::raw_sql(migration.sql)
        .execute(&mut *tx)
        .await
        .map_err(failed)?;

    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
        .bind(migration.version)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(failed)?;

    tx.commit().await.map_err(failed)?;

    info!(
        version = migration.version,
        name = migration.name,
        "Applied schema migration"
    );
    Ok(())
}

impl GraphStore {
    /// Bring the schema to the latest version. Idempotent.
    pub async fn ensure_schema(&self) -> Result<i64> {
        ensure_schema(self.pool()?).await
    }

    /// Highest applied migration version, `0` for an empty database.
    pub async fn schema_version(&self) -> Result<i64> {
        current_version(self.pool()?).await
    }

    /// Read a connection pragma such as `journal_mode` or `foreign_keys`.
    ///
    /// Only a fixed set of pragmas is readable; anything else is
    /// [`StoreError::InvalidInput`].
    pub async fn get_runtime_property(&self, name: &str) -> Result<String> {
        let name = name.trim().to_ascii_lowercase();
        if !READABLE_PRAGMAS.contains(&name.as_str()) {
            return Err(StoreError::InvalidInput(format!(
                "unknown runtime property '{}'",
                name
            )));
        }

        let row = sqlx::query(&format!("PRAGMA {}", name))
            .fetch_optional(self.pool()?)
            .await?;

        let Some(row) = row else {
            return Ok(String::new());
        };
        if let Ok(text) = row.try_get::<String, _>(0) {
            return Ok(text);
        }
        let value: i64 = row.try_get(0)?;
        Ok(value.to_string())
    }
}

const SCHEMA_V1: &str = r#"
CREATE TABLE documents (
    id TEXT PRIMARY KEY NOT NULL,
    source_path TEXT,
    sha256 TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    raw BLOB NOT NULL
);

CREATE INDEX idx_documents_sha256 ON documents(sha256);

CREATE TABLE nodes (
    pk INTEGER PRIMARY KEY AUTOINCREMENT,
    short_id TEXT NOT NULL UNIQUE,
    full_id TEXT NOT NULL UNIQUE CHECK (length(full_id) = 32),
    document_id TEXT NOT NULL REFERENCES documents(id),
    kind TEXT NOT NULL,
    level INTEGER,
    title TEXT,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    parent_pk INTEGER REFERENCES nodes(pk),
    metadata_json TEXT NOT NULL DEFAULT '{}',
    CHECK (start_offset <= end_offset)
);

CREATE INDEX idx_nodes_document ON nodes(document_id);
CREATE INDEX idx_nodes_parent ON nodes(parent_pk);

CREATE TABLE edges (
    src_pk INTEGER NOT NULL REFERENCES nodes(pk),
    dst_pk INTEGER NOT NULL REFERENCES nodes(pk),
    edge_type TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (src_pk, dst_pk, edge_type)
);

CREATE INDEX idx_edges_dst ON edges(dst_pk);
CREATE INDEX idx_edges_type ON edges(edge_type);

-- rowid is the node pk
CREATE VIRTUAL TABLE nodes_fts USING fts5(title, body);
"#;

const SCHEMA_V2: &str = r#"
CREATE TABLE embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_id TEXT NOT NULL,
    model TEXT NOT NULL,
    dims INTEGER NOT NULL CHECK (dims > 0),
    vector BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (full_id, model)
);

CREATE INDEX idx_embeddings_model ON embeddings(model);
"#;

const SCHEMA_V3: &str = r#"
CREATE TABLE collections (
    id TEXT PRIMARY KEY NOT NULL,
    kind TEXT NOT NULL,
    name TEXT NOT NULL UNIQUE,
    metadata_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE collection_members (
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    member_type TEXT NOT NULL CHECK (member_type IN ('document', 'node')),
    member_pk TEXT NOT NULL,
    PRIMARY KEY (collection_id, member_type, member_pk)
);

CREATE INDEX idx_collection_members_member ON collection_members(member_type, member_pk);

CREATE TABLE topics (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    metadata_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE topic_links (
    topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    target_type TEXT NOT NULL CHECK (target_type IN ('document', 'node')),
    target_pk TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (topic_id, target_type, target_pk)
);

CREATE INDEX idx_topic_links_target ON topic_links(target_type, target_pk);

CREATE TABLE project_settings (
    collection_id TEXT PRIMARY KEY NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    defaults_json TEXT NOT NULL DEFAULT '{}',
    updated_at INTEGER NOT NULL
);
"#;
