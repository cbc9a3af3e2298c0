//! Embedding storage keyed by `(node full_id, model)`.
//!
//! Vectors are stored as headerless little-endian `f32` BLOBs of
//! `dims × 4` bytes, with `dims` in its own column. Embeddings reference
//! nodes by `full_id` only; no foreign key ties them to `nodes`, so they
//! outlive re-ingestion until the caller re-embeds or deletes them.
//!
//! - [`vec_to_blob`] / [`blob_to_vec`]: the wire format
//! - [`cosine_similarity`]: ranking for [`GraphStore::nearest`]

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::Embedding;
use crate::store::GraphStore;

/// Pack a vector into its stored form: `len × 4` little-endian bytes.
///
/// ```rust
/// use docgraph::embedding::{blob_to_vec, vec_to_blob};
///
/// let packed = vec_to_blob(&[0.5f32, -4.0]);
/// assert_eq!(packed.len(), 8);
/// assert_eq!(blob_to_vec(&packed, 2).unwrap(), vec![0.5, -4.0]);
/// ```
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Unpack a stored BLOB of `dims` floats.
///
/// A BLOB whose length is not exactly `dims × 4` is [`StoreError::Corrupt`].
pub fn blob_to_vec(blob: &[u8], dims: usize) -> Result<Vec<f32>> {
    if dims.checked_mul(4) != Some(blob.len()) {
        return Err(StoreError::Corrupt(format!(
            "embedding blob is {} bytes, expected {} dims of 4 bytes",
            blob.len(),
            dims
        )));
    }
    let mut vector = Vec::with_capacity(dims);
    for word in blob.chunks_exact(4) {
        let mut le = [0u8; 4];
        le.copy_from_slice(word);
        vector.push(f32::from_le_bytes(le));
    }
    Ok(vector)
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Empty vectors, vectors of different lengths and zero vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, sq_a, sq_b), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, sq_a + x * x, sq_b + y * y)
        });

    let norm = (sq_a * sq_b).sqrt();
    if norm == 0.0 {
        return 0.0;
    }
    (dot / norm).clamp(-1.0, 1.0) as f32
}

fn embedding_from_row(row: &SqliteRow) -> Result<Embedding> {
    let dims: i64 = row.try_get("dims")?;
    let dims = usize::try_from(dims)
        .map_err(|_| StoreError::Corrupt(format!("invalid embedding dims {}", dims)))?;
    let blob: Vec<u8> = row.try_get("vector")?;
    Ok(Embedding {
        id: row.try_get("id")?,
        full_id: row.try_get("full_id")?,
        model: row.try_get("model")?,
        dims,
        vector: blob_to_vec(&blob, dims)?,
        created_at: row.try_get("created_at")?,
    })
}

impl GraphStore {
    /// Store a vector for `(full_id, model)`, replacing any previous one.
    pub async fn store_embedding(
        &self,
        full_id: &str,
        model: &str,
        vector: &[f32],
    ) -> Result<Embedding> {
        if full_id.is_empty() || model.is_empty() {
            return Err(StoreError::InvalidInput(
                "embedding full_id and model must not be empty".into(),
            ));
        }
        if vector.is_empty() {
            return Err(StoreError::InvalidInput("embedding vector is empty".into()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(StoreError::InvalidInput(
                "embedding vector contains non-finite values".into(),
            ));
        }

        let mut tx = self.pool()?.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO embeddings (full_id, model, dims, vector, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(full_id, model) DO UPDATE SET
                dims = excluded.dims,
                vector = excluded.vector,
                created_at = excluded.created_at
            "#,
        )
        .bind(full_id)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(vec_to_blob(vector))
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT id, full_id, model, dims, vector, created_at FROM embeddings WHERE full_id = ? AND model = ?",
        )
        .bind(full_id)
        .bind(model)
        .fetch_one(&mut *tx)
        .await?;
        let embedding = embedding_from_row(&row)?;

        tx.commit().await?;
        debug!(full_id, model, dims = vector.len(), "Stored embedding");
        Ok(embedding)
    }

    pub async fn get_embedding(&self, full_id: &str, model: &str) -> Result<Option<Embedding>> {
        let row = sqlx::query(
            "SELECT id, full_id, model, dims, vector, created_at FROM embeddings WHERE full_id = ? AND model = ?",
        )
        .bind(full_id)
        .bind(model)
        .fetch_optional(self.pool()?)
        .await?;
        row.as_ref().map(embedding_from_row).transpose()
    }

    /// Every embedding stored under `model`, ordered by `full_id`.
    pub async fn all_for_model(&self, model: &str) -> Result<Vec<Embedding>> {
        let rows = sqlx::query(
            "SELECT id, full_id, model, dims, vector, created_at FROM embeddings WHERE model = ? ORDER BY full_id",
        )
        .bind(model)
        .fetch_all(self.pool()?)
        .await?;
        rows.iter().map(embedding_from_row).collect()
    }

    pub async fn delete_embedding(&self, full_id: &str, model: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM embeddings WHERE full_id = ? AND model = ?")
            .bind(full_id)
            .bind(model)
            .execute(self.pool()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Brute-force cosine ranking over every vector for `model`.
    ///
    /// Returns at most `k` `(embedding, similarity)` pairs, most similar first.
    /// Vectors whose dimensionality differs from the query are skipped.
    pub async fn nearest(
        &self,
        model: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(Embedding, f32)>> {
        let mut scored: Vec<(Embedding, f32)> = self
            .all_for_model(model)
            .await?
            .into_iter()
            .filter(|e| e.dims == query.len())
            .map(|e| {
                let similarity = cosine_similarity(query, &e.vector);
                (e, similarity)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.full_id.cmp(&b.0.full_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_is_little_endian() {
        assert_eq!(vec_to_blob(&[1.0f32]), vec![0x00, 0x00, 0x80, 0x3f]);
        assert!(vec_to_blob(&[]).is_empty());
    }

    #[test]
    fn test_blob_length_mismatch_is_corrupt() {
        let blob = vec_to_blob(&[1.0, 2.0]);
        assert!(matches!(blob_to_vec(&blob, 3), Err(StoreError::Corrupt(_))));
        assert!(matches!(blob_to_vec(&blob[..7], 2), Err(StoreError::Corrupt(_))));
        assert!(matches!(blob_to_vec(&blob, usize::MAX), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_similarity_of_parallel_vectors() {
        let sim = cosine_similarity(&[2.0, 4.0], &[1.0, 2.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_sign() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
