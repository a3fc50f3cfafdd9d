//! Random sampling without replacement.

use rand::Rng;
use rand::seq::index;

/// Pick `n_sample` distinct indices from `0..total`, returned in ascending order.
///
/// Panics if `n_sample > total`; callers check the bound and report their own error.
pub fn subsample_indices<R: Rng + ?Sized>(n_sample: usize, total: usize, rng: &mut R) -> Vec<usize> {
    let mut indices = index::sample(rng, total, n_sample).into_vec();
    indices.sort_unstable();
    indices
}

/// Gather the row-major vectors at `indices`.
pub fn gather_rows(vecs: &[f64], dim: usize, indices: &[usize]) -> Vec<f64> {
    let mut gathered = Vec::with_capacity(indices.len() * dim);
    for &i in indices {
        gathered.extend_from_slice(&vecs[i * dim..(i + 1) * dim]);
    }
    gathered
}

/// Gather the items at `indices`.
pub fn gather<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}
