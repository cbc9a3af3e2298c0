//! Graph building: ordered blocks → node/edge hierarchy.
//!
//! # Algorithm
//!
//! 1. Register the document (dedup / forced replace).
//! 2. Create the `doc` root spanning the whole document and push it on the
//!    ancestor stack at level 0.
//! 3. For each block in order:
//!    - a heading at level `L` pops the stack while the top level is `>= L`;
//!      the new top is its parent. Any other block takes the current top.
//!    - allocate ids, insert the node, add a `contains` edge from the parent.
//!    - if the parent already has a child, add a `next` edge from that child.
//!    - headings are pushed at their level.
//!    - index the node text.
//! 4. Commit. Any error drops the transaction and nothing is persisted.
//!
//! Given `# A`, `## B`, text, `# C`:
//!
//! ```text
//! doc ─contains─▶ A ─contains─▶ B ─contains─▶ text
//!  │              │
//!  └─contains─▶ C ◀─next─┘
//! ```

use std::collections::HashMap;
use tracing::info;

use crate::documents;
use crate::edges;
use crate::error::{Result, StoreError};
use crate::fts;
use crate::ids::BlockDescriptor;
use crate::metadata::Metadata;
use crate::models::{
    Block, BuiltGraph, NewDocument, NewNode, NodeKind, EDGE_CONTAINS, EDGE_NEXT,
};
use crate::nodes;
use crate::store::GraphStore;

/// Metadata key holding a code block's language.
pub const META_LANGUAGE: &str = "language";
/// Metadata key holding the nonce used when id allocation collided.
pub const META_ID_NONCE: &str = "id_nonce";

/// Open headings above the current position, root at the bottom.
#[derive(Debug)]
struct AncestorStack {
    entries: Vec<(i64, u32)>,
}

impl AncestorStack {
    fn new(root_pk: i64) -> Self {
        Self {
            entries: vec![(root_pk, 0)],
        }
    }

    fn top(&self) -> i64 {
        // The root is never popped.
        self.entries[self.entries.len() - 1].0
    }

    /// Close every open heading at `level` or deeper and return the parent.
    fn parent_for_heading(&mut self, level: u32) -> i64 {
        while self.entries.len() > 1 && self.entries[self.entries.len() - 1].1 >= level {
            self.entries.pop();
        }
        self.top()
    }

    fn push(&mut self, pk: i64, level: u32) {
        self.entries.push((pk, level));
    }
}

/// Check every block and return its canonical kind.
///
/// Spans must lie inside the document with `start <= end`, and both `start`
/// and `end` must be non-decreasing across the sequence. Kinds are normalised
/// by name, so `Other("heading")` is a heading; an empty name and `doc` are
/// rejected. Headings need a level >= 1.
fn validate_blocks(raw: &[u8], blocks: &[Block]) -> Result<Vec<NodeKind>> {
    let mut kinds = Vec::with_capacity(blocks.len());
    let (mut prev_start, mut prev_end) = (0usize, 0usize);
    for (i, block) in blocks.iter().enumerate() {
        if block.start > block.end || block.end > raw.len() {
            return Err(StoreError::InvalidInput(format!(
                "block {} span [{}, {}) is outside the document ({} bytes)",
                i,
                block.start,
                block.end,
                raw.len()
            )));
        }
        if block.start < prev_start || block.end < prev_end {
            return Err(StoreError::InvalidInput(format!(
                "block {} span [{}, {}) goes back before the previous block [{}, {})",
                i, block.start, block.end, prev_start, prev_end
            )));
        }

        let kind: NodeKind = block.kind.as_str().parse().map_err(|_| {
            StoreError::InvalidInput(format!("block {} has an empty kind", i))
        })?;
        if kind == NodeKind::Doc {
            return Err(StoreError::InvalidInput(format!(
                "block {} has reserved kind 'doc'",
                i
            )));
        }
        if kind == NodeKind::Heading && !matches!(block.level, Some(l) if l >= 1) {
            return Err(StoreError::InvalidInput(format!(
                "heading block {} needs a level >= 1",
                i
            )));
        }

        prev_start = block.start;
        prev_end = block.end;
        kinds.push(kind);
    }
    Ok(kinds)
}

fn block_text(raw: &[u8], block: &Block) -> String {
    String::from_utf8_lossy(&raw[block.start..block.end]).into_owned()
}

impl GraphStore {
    /// Register a document and build its graph in one transaction.
    ///
    /// Fails with [`StoreError::DuplicateDocument`] when the id exists and
    /// `force` is not set. On any error nothing is persisted.
    pub async fn build_document(
        &self,
        doc: &NewDocument,
        blocks: &[Block],
        force: bool,
    ) -> Result<BuiltGraph> {
        let kinds = validate_blocks(&doc.raw, blocks)?;

        let mut tx = self.pool()?.begin().await?;
        let outcome = documents::register(&mut tx, doc, force).await?;

        let root_ids = self
            .ids()
            .allocate(
                &mut tx,
                &doc.id,
                &BlockDescriptor {
                    kind: &NodeKind::Doc,
                    start: 0,
                    end: doc.raw.len(),
                    seq: 0,
                },
            )
            .await?;
        let mut root_meta = Metadata::new();
        if let Some(nonce) = root_ids.nonce {
            root_meta.insert(META_ID_NONCE, nonce);
        }
        let root = nodes::insert_node(
            &mut tx,
            &NewNode {
                short_id: root_ids.short_id,
                full_id: root_ids.full_id,
                document_id: doc.id.clone(),
                kind: NodeKind::Doc,
                level: None,
                title: None,
                start: 0,
                end: doc.raw.len() as i64,
                parent_pk: None,
                metadata: root_meta,
            },
        )
        .await?;

        let mut stack = AncestorStack::new(root.pk);
        let mut last_child: HashMap<i64, i64> = HashMap::new();
        let mut created = vec![root.clone()];
        let mut created_edges = Vec::new();
        let no_meta = Metadata::new();

        for (i, (block, kind)) in blocks.iter().zip(kinds).enumerate() {
            let (parent_pk, level) = match (kind == NodeKind::Heading, block.level) {
                (true, Some(level)) => (stack.parent_for_heading(level), Some(level)),
                _ => (stack.top(), None),
            };

            let ids = self
                .ids()
                .allocate(
                    &mut tx,
                    &doc.id,
                    &BlockDescriptor {
                        kind: &kind,
                        start: block.start,
                        end: block.end,
                        seq: i + 1,
                    },
                )
                .await?;

            let mut metadata = Metadata::new();
            if let Some(language) = &block.language {
                metadata.insert(META_LANGUAGE, language.as_str());
            }
            if let Some(nonce) = ids.nonce {
                metadata.insert(META_ID_NONCE, nonce);
            }

            let node = nodes::insert_node(
                &mut tx,
                &NewNode {
                    short_id: ids.short_id,
                    full_id: ids.full_id,
                    document_id: doc.id.clone(),
                    kind,
                    level,
                    title: block.title.clone(),
                    start: block.start as i64,
                    end: block.end as i64,
                    parent_pk: Some(parent_pk),
                    metadata,
                },
            )
            .await?;

            created_edges.push(
                edges::insert_edge(&mut tx, parent_pk, node.pk, EDGE_CONTAINS, 1.0, &no_meta)
                    .await?,
            );
            if let Some(prev) = last_child.insert(parent_pk, node.pk) {
                created_edges.push(
                    edges::insert_edge(&mut tx, prev, node.pk, EDGE_NEXT, 1.0, &no_meta).await?,
                );
            }

            if let Some(level) = level {
                stack.push(node.pk, level);
            }

            fts::index(
                &mut tx,
                node.pk,
                node.title.as_deref(),
                &block_text(&doc.raw, block),
            )
            .await?;

            created.push(node);
        }

        tx.commit().await?;

        info!(
            document_id = %doc.id,
            ?outcome,
            nodes = created.len(),
            edges = created_edges.len(),
            "Built document graph"
        );

        Ok(BuiltGraph {
            outcome,
            root,
            nodes: created,
            edges: created_edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_parents_headings_to_shallower_level() {
        let mut stack = AncestorStack::new(1);
        assert_eq!(stack.parent_for_heading(1), 1);
        stack.push(2, 1);
        assert_eq!(stack.parent_for_heading(2), 2);
        stack.push(3, 2);
        assert_eq!(stack.parent_for_heading(3), 3);
        stack.push(4, 3);
        // A new H2 closes the H3 and the old H2.
        assert_eq!(stack.parent_for_heading(2), 2);
    }

    #[test]
    fn test_stack_never_pops_root() {
        let mut stack = AncestorStack::new(7);
        stack.push(8, 1);
        assert_eq!(stack.parent_for_heading(1), 7);
        assert_eq!(stack.parent_for_heading(0), 7);
        assert_eq!(stack.top(), 7);
    }

    #[test]
    fn test_skipped_levels() {
        // H1, H3, then H2: the H2 closes the H3 but stays under the H1.
        let mut stack = AncestorStack::new(1);
        stack.push(2, 1);
        assert_eq!(stack.parent_for_heading(3), 2);
        stack.push(3, 3);
        assert_eq!(stack.parent_for_heading(2), 2);
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_span() {
        let raw = b"# Title";
        let err = validate_blocks(raw, &[Block::paragraph(0, 99)]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_rejects_decreasing_starts() {
        let raw = b"abcdefghij";
        let blocks = [Block::paragraph(5, 8), Block::paragraph(2, 4)];
        assert!(validate_blocks(raw, &blocks).is_err());
    }

    #[test]
    fn test_validate_rejects_heading_without_level() {
        let raw = b"# x";
        let mut heading = Block::heading(1, "x", 0, 3);
        heading.level = None;
        assert!(validate_blocks(raw, &[heading]).is_err());
        let zero = Block::heading(0, "x", 0, 3);
        assert!(validate_blocks(raw, &[zero]).is_err());
    }

    #[test]
    fn test_validate_accepts_nested_spans() {
        let raw = b"# A\n\ntext";
        let blocks = [Block::heading(1, "A", 0, 3), Block::paragraph(5, 9)];
        assert!(validate_blocks(raw, &blocks).is_ok());
    }

    #[test]
    fn test_validate_rejects_decreasing_ends() {
        let raw = b"abcdefghij";
        let blocks = [Block::paragraph(0, 8), Block::paragraph(2, 4)];
        assert!(matches!(
            validate_blocks(raw, &blocks),
            Err(StoreError::InvalidInput(_))
        ));
    }

    fn other(name: &str, level: Option<u32>) -> Block {
        Block {
            kind: NodeKind::Other(name.to_string()),
            start: 0,
            end: 3,
            level,
            title: None,
            language: None,
        }
    }

    #[test]
    fn test_validate_rejects_unreadable_kinds() {
        let raw = b"# x";
        for block in [other("", None), other("doc", None), other("heading", None)] {
            let err = validate_blocks(raw, &[block.clone()]).unwrap_err();
            assert!(matches!(err, StoreError::InvalidInput(_)), "{:?}", block);
        }
    }

    #[test]
    fn test_validate_normalises_kind_names() {
        let raw = b"# x";
        let kinds = validate_blocks(raw, &[other("heading", Some(2))]).unwrap();
        assert_eq!(kinds, vec![NodeKind::Heading]);
        let kinds = validate_blocks(raw, &[other("table", None)]).unwrap();
        assert_eq!(kinds, vec![NodeKind::Other("table".to_string())]);
    }

    #[test]
    fn test_block_text_is_lossy() {
        let raw = [b'a', 0xff, b'b'];
        assert_eq!(block_text(&raw, &Block::paragraph(0, 3)), "a\u{fffd}b");
    }
}
