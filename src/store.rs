//! The store handle and its open/close lifecycle.
//!
//! [`GraphStore`] is the single entry point for every component: schema
//! management, document registration, graph building, search, traversal,
//! embeddings, collections and topics. Component operations live in their
//! own modules as `impl GraphStore` blocks.
//!
//! ```rust,no_run
//! # async fn demo() -> docgraph::error::Result<()> {
//! use docgraph::config::StoreConfig;
//! use docgraph::store::GraphStore;
//!
//! let mut store = GraphStore::connect(StoreConfig::at_path("data/graph.sqlite")).await?;
//! println!("schema v{}", store.schema_version().await?);
//! store.close().await;
//! store.close().await; // no-op
//! # Ok(())
//! # }
//! ```

use sqlx::SqlitePool;
use tracing::info;

use crate::config::StoreConfig;
use crate::db;
use crate::error::{Result, StoreError};
use crate::ids::NodeIdAllocator;
use crate::migrate;

pub struct GraphStore {
    config: StoreConfig,
    pool: Option<SqlitePool>,
    ids: NodeIdAllocator,
}

impl GraphStore {
    /// Build an unopened handle. Nothing touches the disk until [`open`](Self::open).
    pub fn new(config: StoreConfig) -> Self {
        let ids = NodeIdAllocator::new(config.ids.short_id_len);
        Self {
            config,
            pool: None,
            ids,
        }
    }

    /// Build a handle and open it.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let mut store = Self::new(config);
        store.open().await?;
        Ok(store)
    }

    /// Connect and bring the schema to the latest version.
    ///
    /// Opening an already-open store does nothing.
    pub async fn open(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let pool = db::connect(&self.config).await?;
        if let Err(e) = migrate::ensure_schema(&pool).await {
            pool.close().await;
            return Err(e);
        }
        info!(path = %self.config.db.path.display(), "Graph store opened");
        self.pool = Some(pool);
        Ok(())
    }

    /// Release the connection. Safe to call repeatedly or on an unopened store.
    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            info!(path = %self.config.db.path.display(), "Graph store closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.pool.is_some()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying pool, for callers that need raw SQL access.
    pub fn pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or(StoreError::NotOpen)
    }

    pub(crate) fn ids(&self) -> &NodeIdAllocator {
        &self.ids
    }
}
