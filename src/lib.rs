//! # docgraph
//!
//! An embedded store that turns tokenized documents into a persistent graph
//! of nodes and typed edges, keeps an FTS5 index over that graph in
//! lock-step with it, and layers embeddings, collections and topics on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │  Blocks    │──▶│ GraphBuilder │──▶│ SQLite               │
//! │ (external) │   │ ids + edges  │   │ documents/nodes/edges│
//! └────────────┘   └──────────────┘   │ nodes_fts (FTS5)     │
//!                                     │ embeddings           │
//!                                     │ collections/topics   │
//!                                     └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn demo() -> docgraph::error::Result<()> {
//! use docgraph::config::StoreConfig;
//! use docgraph::models::{Block, NewDocument};
//! use docgraph::store::GraphStore;
//!
//! let store = GraphStore::connect(StoreConfig::in_memory()).await?;
//! let raw = "# Title\n\nSome text.";
//! let blocks = [Block::heading(1, "Title", 0, 7), Block::paragraph(9, 19)];
//! let built = store
//!     .build_document(&NewDocument::new("readme", raw), &blocks, false)
//!     .await?;
//! assert_eq!(built.nodes.len(), 3);
//! let hits = store.search("title", None).await?;
//! assert_eq!(hits[0].node.pk, built.nodes[1].pk);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`store`] | Store handle and open/close lifecycle |
//! | [`migrate`] | Schema versions and runtime properties |
//! | [`ids`] | Deterministic node id allocation |
//! | [`documents`] | Content-addressed registration and cascade delete |
//! | [`graph`] | Blocks → node/edge hierarchy |
//! | [`nodes`] | Node lookups |
//! | [`edges`] | Edge persistence and traversal |
//! | [`fts`] | Full-text index and ranked search |
//! | [`embedding`] | Vector storage and similarity |
//! | [`collections`] | Collections, members, project settings |
//! | [`topics`] | Weighted topic tagging |
//! | [`stats`] | Row counts |

pub mod collections;
pub mod config;
pub mod db;
pub mod documents;
pub mod edges;
pub mod embedding;
pub mod error;
pub mod fts;
pub mod graph;
pub mod ids;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod nodes;
pub mod stats;
pub mod store;
pub mod topics;
