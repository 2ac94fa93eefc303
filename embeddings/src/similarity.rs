//! Similarity computation for embeddings.

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Products and norms are accumulated in `f64` so that rounding error stays
/// small over high-dimensional inputs. Returns a value between -1.0 and 1.0,
/// where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Fails with [`EmbeddingError::LengthMismatch`] when the lengths differ and
/// with [`EmbeddingError::ZeroVector`] when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EmbeddingError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (dot, norm_a, norm_b) =
        a.iter()
            .zip(b)
            .fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&x, &y)| {
                let (x, y) = (f64::from(x), f64::from(y));
                (dot + x * y, na + x * x, nb + y * y)
            });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
