//! Compute the distance between vectors.

/// Squared L2 distance.
pub fn squared_euclidean(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter()
        .zip(rhs.iter())
        .map(|(&l, &r)| (l - r) * (l - r))
        .sum()
}

/// Pairwise squared L2 distances of `n` row-major vectors, as a flat `n * n` matrix.
pub fn pairwise_squared_euclidean(vecs: &[f64], dim: usize) -> Vec<f64> {
    let num = vecs.len() / dim;
    let mut distances = vec![0.0; num * num];
    for (i, lhs) in vecs.chunks(dim).enumerate() {
        for (j, rhs) in vecs.chunks(dim).enumerate().skip(i + 1) {
            let d = squared_euclidean(lhs, rhs);
            distances[i * num + j] = d;
            distances[j * num + i] = d;
        }
    }
    distances
}

/// Column-wise mean of row-major vectors.
pub fn column_means(vecs: &[f64], dim: usize) -> Vec<f64> {
    let mut means = vec![0.0; dim];
    let mut count = 0usize;
    for vec in vecs.chunks(dim) {
        count += 1;
        means
            .iter_mut()
            .zip(vec.iter())
            .for_each(|(m, &v)| *m += v);
    }
    if count > 0 {
        let divider = (count as f64).recip();
        means.iter_mut().for_each(|m| *m *= divider);
    }
    means
}

/// Subtract the column-wise mean from every vector in place.
pub fn center(vecs: &mut [f64], dim: usize) {
    let means = column_means(vecs, dim);
    for vec in vecs.chunks_mut(dim) {
        vec.iter_mut().zip(means.iter()).for_each(|(v, &m)| *v -= m);
    }
}
