use simsimd::SpatialSimilarity;

/// Cosine similarity in `[-1, 1]`. Mismatched lengths, empty input or a
/// zero-magnitude vector yield `0.0` instead of an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() || is_zero(a) || is_zero(b) {
        return 0.0;
    }

    f32::cosine(a, b)
        .map(|distance| (1.0 - distance) as f32)
        .filter(|sim| sim.is_finite())
        .map(|sim| sim.clamp(-1.0, 1.0))
        .unwrap_or(0.0)
}

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
