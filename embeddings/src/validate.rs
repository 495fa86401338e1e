//! Structural checks on embedding vectors.

/// Minimum length of a usable vector; also the length of the prefix checked
/// for non-finite values.
pub const MIN_VECTOR_LEN: usize = 8;

/// Whether `vector` can be trusted as an embedding.
///
/// Rejects absent vectors, vectors shorter than [`MIN_VECTOR_LEN`] and
/// vectors with a NaN or infinity among their first [`MIN_VECTOR_LEN`]
/// elements.
pub fn is_valid_vector(vector: Option<&[f32]>) -> bool {
    match vector {
        Some(values) if values.len() >= MIN_VECTOR_LEN => values[..MIN_VECTOR_LEN]
            .iter()
            .all(|value| value.is_finite()),
        _ => false,
    }
}

/// Truncate or zero-pad `vector` to exactly `dimension` elements.
pub fn fit_to_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    vector.resize(dimension, 0.0);
    vector
}
