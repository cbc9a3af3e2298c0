//! Deterministic node identifier allocation.
//!
//! Both identifiers come from one SHA-256 digest over
//! `(document id, block kind, start, end, sequence index, nonce)`:
//!
//! - `full_id` is the first 32 hex characters of the digest.
//! - `short_id` is taken from the tail of the same digest, so the two are
//!   independent candidates that collide independently.
//!
//! When either candidate is already present in `nodes`, the nonce is bumped
//! and the digest recomputed. Identical inputs therefore always yield the same
//! ids unless a collision forced a nonce, and the nonce actually used is
//! reported back so the caller can persist it.

use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::Result;
use crate::models::NodeKind;

/// Length of a node's `full_id` in hex characters.
pub const FULL_ID_LEN: usize = 32;

/// The inputs that identify one node.
#[derive(Debug, Clone, Copy)]
pub struct BlockDescriptor<'a> {
    pub kind: &'a NodeKind,
    pub start: usize,
    pub end: usize,
    /// Position of the node in creation order within its document (root = 0).
    pub seq: usize,
}

/// Identifiers chosen for a new node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedIds {
    pub short_id: String,
    pub full_id: String,
    /// `Some(n)` when a collision forced nonce `n > 0`.
    pub nonce: Option<u64>,
}

/// Allocates `(short_id, full_id)` pairs that are unique in the store.
#[derive(Debug, Clone)]
pub struct NodeIdAllocator {
    short_len: usize,
}

impl NodeIdAllocator {
    pub fn new(short_len: usize) -> Self {
        Self {
            short_len: short_len.clamp(1, 64 - FULL_ID_LEN),
        }
    }

    /// Candidate ids for a given nonce. Pure; no store access.
    pub fn candidate(
        &self,
        document_id: &str,
        block: &BlockDescriptor<'_>,
        nonce: u64,
    ) -> (String, String) {
        let mut hasher = Sha256::new();
        for field in [document_id.as_bytes(), block.kind.as_str().as_bytes()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.update((block.start as u64).to_le_bytes());
        hasher.update((block.end as u64).to_le_bytes());
        hasher.update((block.seq as u64).to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        let digest = hex::encode(hasher.finalize());

        let full_id = digest[..FULL_ID_LEN].to_string();
        let short_id = digest[digest.len() - self.short_len..].to_string();
        (short_id, full_id)
    }

    /// Pick the first candidate pair that is free in `nodes`.
    ///
    /// Terminates as soon as a free pair is found; the nonce space is the
    /// full `u64` range. Only store errors are returned.
    pub async fn allocate(
        &self,
        conn: &mut SqliteConnection,
        document_id: &str,
        block: &BlockDescriptor<'_>,
    ) -> Result<AllocatedIds> {
        let mut nonce: u64 = 0;
        loop {
            let (short_id, full_id) = self.candidate(document_id, block, nonce);

            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM nodes WHERE short_id = ? OR full_id = ?)",
            )
            .bind(&short_id)
            .bind(&full_id)
            .fetch_one(&mut *conn)
            .await?;

            if !taken {
                return Ok(AllocatedIds {
                    short_id,
                    full_id,
                    nonce: (nonce > 0).then_some(nonce),
                });
            }

            debug!(document_id, nonce, %short_id, "Node id collision, retrying");
            nonce = nonce.wrapping_add(1);
        }
    }
}

/// Returns `true` for a well-formed `full_id`.
pub fn is_valid_full_id(id: &str) -> bool {
    id.len() == FULL_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: &NodeKind, seq: usize) -> BlockDescriptor<'_> {
        BlockDescriptor {
            kind,
            start: 0,
            end: 10,
            seq,
        }
    }

    #[test]
    fn test_candidate_is_deterministic() {
        let alloc = NodeIdAllocator::new(8);
        let kind = NodeKind::Heading;
        let a = alloc.candidate("doc-1", &descriptor(&kind, 1), 0);
        let b = alloc.candidate("doc-1", &descriptor(&kind, 1), 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_candidate_shapes() {
        let alloc = NodeIdAllocator::new(10);
        let kind = NodeKind::Paragraph;
        let (short_id, full_id) = alloc.candidate("doc-1", &descriptor(&kind, 3), 0);
        assert!(is_valid_full_id(&full_id));
        assert_eq!(short_id.len(), 10);
        assert!(short_id.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_every_input_changes_the_digest() {
        let alloc = NodeIdAllocator::new(8);
        let heading = NodeKind::Heading;
        let paragraph = NodeKind::Paragraph;
        let base = alloc.candidate("doc-1", &descriptor(&heading, 1), 0);

        assert_ne!(base, alloc.candidate("doc-2", &descriptor(&heading, 1), 0));
        assert_ne!(base, alloc.candidate("doc-1", &descriptor(&paragraph, 1), 0));
        assert_ne!(base, alloc.candidate("doc-1", &descriptor(&heading, 2), 0));
        assert_ne!(base, alloc.candidate("doc-1", &descriptor(&heading, 1), 1));
        let shifted = BlockDescriptor {
            start: 1,
            ..descriptor(&heading, 1)
        };
        assert_ne!(base, alloc.candidate("doc-1", &shifted, 0));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // "ab" + kind "c..." must not hash like "a" + kind "bc...".
        let alloc = NodeIdAllocator::new(8);
        let k1 = NodeKind::Other("cx".to_string());
        let k2 = NodeKind::Other("bcx".to_string());
        assert_ne!(
            alloc.candidate("ab", &descriptor(&k1, 0), 0),
            alloc.candidate("a", &descriptor(&k2, 0), 0)
        );
    }

    #[test]
    fn test_full_id_validation() {
        assert!(is_valid_full_id("0123456789abcdef0123456789abcdef"));
        assert!(!is_valid_full_id("0123456789ABCDEF0123456789abcdef"));
        assert!(!is_valid_full_id("0123"));
    }
}
