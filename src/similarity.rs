//! Similarity scores between embeddings

use crate::error::{Result, StoreError};
use crate::vector::Vector;

/// Compute dot product of two vectors
pub fn dot_product(v1: &Vector, v2: &Vector) -> f64 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}

/// Compute cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns exactly `0.0` when either vector has zero norm. Errors only when
/// the dimensions differ.
pub fn cosine_similarity(v1: &Vector, v2: &Vector) -> Result<f64> {
    if !v1.has_same_dimension(v2) {
        return Err(StoreError::DimensionMismatch {
            expected: v1.dimension(),
            actual: v2.dimension(),
        });
    }

    if v1.is_zero() || v2.is_zero() {
        return Ok(0.0);
    }

    let similarity = dot_product(v1, v2) / (v1.norm() * v2.norm());

    // Clamp to [-1, 1] to handle floating point errors
    Ok(similarity.clamp(-1.0, 1.0))
}
