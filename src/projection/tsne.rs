//! Exact t-SNE to two dimensions.

use std::time::Instant;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
#[cfg(not(feature = "perf"))]
use rayon::prelude::*;

use super::{Pca, ProjectionError, Projector};
use crate::distance::{center, pairwise_squared_euclidean, squared_euclidean};
use crate::features::FeatureTable;

/// Above this many columns the input is reduced with PCA first.
const MAX_NUMBER_FEATURES: usize = 50;
const PERPLEXITY: f64 = 30.0;
const OUTPUT_DIM: usize = 2;
const EARLY_EXAGGERATION: f64 = 12.0;
const EXAGGERATION_ITER: u32 = 250;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const INIT_STD: f64 = 1e-4;
const MIN_PROBABILITY: f64 = 1e-12;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 100;
/// Exact t-SNE keeps an `n * n` affinity matrix, so larger inputs are refused.
const MAX_NUMBER_ROWS: usize = 10_000;

/// t-SNE projection producing `TSNE0` and `TSNE1`.
#[derive(Debug, Clone)]
pub struct Tsne {
    perplexity: f64,
    max_features: usize,
    max_iter: u32,
    max_rows: usize,
    seed: u64,
}

impl Default for Tsne {
    fn default() -> Self {
        Self {
            perplexity: PERPLEXITY,
            max_features: MAX_NUMBER_FEATURES,
            max_iter: 1000,
            max_rows: MAX_NUMBER_ROWS,
            seed: 0,
        }
    }
}

impl Tsne {
    /// Create a new t-SNE instance.
    ///
    /// # Arguments
    ///
    /// * `perplexity` - effective number of neighbours, lowered to `rows - 1` for small inputs
    /// * `max_features` - inputs with more columns are reduced with PCA first
    /// * `max_iter` - number of gradient descent iterations
    /// * `seed` - seed of the random initial embedding
    pub fn new(perplexity: f64, max_features: usize, max_iter: u32, seed: u64) -> Self {
        if perplexity <= 0.0 {
            panic!("perplexity must be greater than 0.0");
        }
        if max_features < OUTPUT_DIM {
            panic!("max_features must be at least {OUTPUT_DIM}");
        }
        if max_iter < 1 {
            panic!("max_iter must be greater than 0");
        }
        Self {
            perplexity,
            max_features,
            max_iter,
            max_rows: MAX_NUMBER_ROWS,
            seed,
        }
    }

    /// Replace the seed of the random initial embedding.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Refuse inputs with more than `max_rows` rows.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        if max_rows < 2 {
            panic!("max_rows must be at least 2");
        }
        self.max_rows = max_rows;
        self
    }

    /// Reduce the columns with PCA if there are too many for t-SNE to work well.
    fn maybe_reduce(&self, features: &FeatureTable) -> Result<Option<FeatureTable>, ProjectionError> {
        if features.dim() <= self.max_features {
            return Ok(None);
        }
        let components = self.max_features.min(features.rows());
        debug!(
            "t-SNE: reducing {} features to {} with PCA first",
            features.dim(),
            components
        );
        Pca::new(components).project(features).map(Some)
    }

    fn embed(&self, vecs: &[f64], dim: usize) -> Vec<f64> {
        let num = vecs.len() / dim;
        let perplexity = self.perplexity.min((num - 1) as f64);
        let learning_rate = (num as f64 / EARLY_EXAGGERATION / 4.0).max(50.0);
        debug!("t-SNE: {num} points, perplexity {perplexity}, learning rate {learning_rate}");

        let start = Instant::now();
        let p = joint_probabilities(vecs, dim, perplexity);
        debug!("t-SNE: affinities take {} s", start.elapsed().as_secs_f32());

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut y: Vec<f64> = (0..num * OUTPUT_DIM)
            .map(|_| INIT_STD * rng.sample::<f64, _>(StandardNormal))
            .collect();
        let mut update = vec![0.0_f64; y.len()];
        let mut gains = vec![1.0_f64; y.len()];
        let mut grad = vec![0.0_f64; y.len()];

        for iter in 0..self.max_iter {
            let (exaggeration, momentum) = if iter < EXAGGERATION_ITER {
                (EARLY_EXAGGERATION, INITIAL_MOMENTUM)
            } else {
                (1.0, FINAL_MOMENTUM)
            };
            let kl = gradient(&p, &y, exaggeration, &mut grad);

            for ((yi, (u, g)), &dy) in y
                .iter_mut()
                .zip(update.iter_mut().zip(gains.iter_mut()))
                .zip(grad.iter())
            {
                *g = if dy.signum() != u.signum() {
                    *g + 0.2
                } else {
                    (*g * 0.8).max(MIN_GAIN)
                };
                *u = momentum * *u - learning_rate * *g * dy;
                *yi += *u;
            }
            center(&mut y, OUTPUT_DIM);

            if (iter + 1) % 50 == 0 {
                debug!("t-SNE: iter {} KL divergence {:.6}", iter + 1, kl);
            }
        }
        y
    }
}

impl Projector for Tsne {
    fn name(&self) -> &'static str {
        "t-SNE"
    }

    fn project(&self, features: &FeatureTable) -> Result<FeatureTable, ProjectionError> {
        if features.rows() < 2 {
            return Err(ProjectionError::TooFewRows {
                method: self.name(),
                required: 2,
                actual: features.rows(),
            });
        }
        if features.rows() > self.max_rows {
            return Err(ProjectionError::TooManyRows {
                method: self.name(),
                limit: self.max_rows,
                actual: features.rows(),
            });
        }
        let reduced = self.maybe_reduce(features)?;
        let input = reduced.as_ref().unwrap_or(features);
        let y = self.embed(input.values(), input.dim());
        Ok(FeatureTable::with_prefix("TSNE", OUTPUT_DIM, y))
    }
}

/// Symmetric joint probabilities `P` (flat `n * n`) matching the perplexity per point.
///
/// The distance matrix is turned into conditional probabilities and then
/// symmetrized in place, so only one `n * n` buffer is alive.
fn joint_probabilities(vecs: &[f64], dim: usize, perplexity: f64) -> Vec<f64> {
    let num = vecs.len() / dim;
    let mut matrix = pairwise_squared_euclidean(vecs, dim);
    let target_entropy = perplexity.ln();

    let to_conditional = |(i, row): (usize, &mut [f64])| {
        let dist = row.to_vec();
        conditional_row(i, &dist, target_entropy, row);
    };
    #[cfg(not(feature = "perf"))]
    matrix.par_chunks_mut(num).enumerate().for_each(to_conditional);
    #[cfg(feature = "perf")]
    matrix.chunks_mut(num).enumerate().for_each(to_conditional);

    let divider = 2.0 * num as f64;
    for i in 0..num {
        matrix[i * num + i] = MIN_PROBABILITY;
        for j in i + 1..num {
            let joint = ((matrix[i * num + j] + matrix[j * num + i]) / divider).max(MIN_PROBABILITY);
            matrix[i * num + j] = joint;
            matrix[j * num + i] = joint;
        }
    }
    matrix
}

/// Binary search the Gaussian precision of point `i` so its distribution has the target entropy.
fn conditional_row(i: usize, dist: &[f64], target_entropy: f64, row: &mut [f64]) {
    // shift by the nearest neighbour so the largest kernel value is exactly 1
    let nearest = dist
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &d)| d)
        .fold(f64::INFINITY, f64::min);
    let mut beta = 1.0;
    let (mut lo, mut hi) = (f64::NEG_INFINITY, f64::INFINITY);

    for _ in 0..PERPLEXITY_STEPS {
        let mut sum = 0.0;
        for (j, (p, &d)) in row.iter_mut().zip(dist).enumerate() {
            *p = if j == i { 0.0 } else { (-(d - nearest) * beta).exp() };
            sum += *p;
        }
        let mut weighted = 0.0;
        for (p, &d) in row.iter_mut().zip(dist) {
            *p /= sum;
            weighted += (d - nearest) * *p;
        }
        let entropy = sum.ln() + beta * weighted;

        let diff = entropy - target_entropy;
        if diff.abs() < PERPLEXITY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            lo = beta;
            beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
        } else {
            hi = beta;
            beta = if lo.is_finite() { (beta + lo) / 2.0 } else { beta / 2.0 };
        }
    }
}

/// Student-t kernel `1 / (1 + |yi - yj|^2)`.
fn kernel(yi: &[f64], yj: &[f64]) -> f64 {
    1.0 / (1.0 + squared_euclidean(yi, yj))
}

/// Sum of the kernel from point `i` to every other point.
fn kernel_row_sum(i: usize, y: &[f64]) -> f64 {
    let yi = &y[i * OUTPUT_DIM..(i + 1) * OUTPUT_DIM];
    y.chunks(OUTPUT_DIM)
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, yj)| kernel(yi, yj))
        .sum()
}

/// Gradient of point `i` written to `grad_i`; returns its share of the KL divergence.
fn gradient_row(
    i: usize,
    p_row: &[f64],
    y: &[f64],
    sum: f64,
    exaggeration: f64,
    grad_i: &mut [f64],
) -> f64 {
    let yi = &y[i * OUTPUT_DIM..(i + 1) * OUTPUT_DIM];
    grad_i.iter_mut().for_each(|g| *g = 0.0);
    let mut kl = 0.0;
    for (j, (yj, &pij)) in y.chunks(OUTPUT_DIM).zip(p_row).enumerate() {
        if i == j {
            continue;
        }
        let k = kernel(yi, yj);
        let q = (k / sum).max(MIN_PROBABILITY);
        kl += pij * (pij / q).ln();
        let force = 4.0 * (exaggeration * pij - q) * k;
        for ((g, a), b) in grad_i.iter_mut().zip(yi).zip(yj) {
            *g += force * (a - b);
        }
    }
    kl
}

/// Fill `grad` with the KL gradient for embedding `y`; returns the KL divergence.
///
/// The kernel is recomputed in the second pass instead of being stored as an `n * n` matrix.
fn gradient(p: &[f64], y: &[f64], exaggeration: f64, grad: &mut [f64]) -> f64 {
    let num = y.len() / OUTPUT_DIM;
    // per-row partials are summed in order so results do not depend on thread scheduling
    #[cfg(not(feature = "perf"))]
    let row_sums: Vec<f64> = (0..num).into_par_iter().map(|i| kernel_row_sum(i, y)).collect();
    #[cfg(feature = "perf")]
    let row_sums: Vec<f64> = (0..num).map(|i| kernel_row_sum(i, y)).collect();
    let sum = row_sums.iter().sum::<f64>().max(f64::MIN_POSITIVE);

    let row = |(i, (grad_i, p_row)): (usize, (&mut [f64], &[f64]))| {
        gradient_row(i, p_row, y, sum, exaggeration, grad_i)
    };
    #[cfg(not(feature = "perf"))]
    let row_kl: Vec<f64> = grad
        .par_chunks_mut(OUTPUT_DIM)
        .zip(p.par_chunks(num))
        .enumerate()
        .map(row)
        .collect();
    #[cfg(feature = "perf")]
    let row_kl: Vec<f64> = grad
        .chunks_mut(OUTPUT_DIM)
        .zip(p.chunks(num))
        .enumerate()
        .map(row)
        .collect();
    row_kl.iter().sum()
}

#[cfg(test)]
mod test {
    use rand::Rng;

    use super::{OUTPUT_DIM, Projector, Tsne, gradient, joint_probabilities};
    use crate::distance::squared_euclidean;
    use crate::features::FeatureTable;
    use crate::projection::ProjectionError;

    #[test]
    fn test_joint_probabilities() {
        let mut rng = rand::rng();
        let (num, dim) = (30, 3);
        let vecs: Vec<f64> = (0..num * dim).map(|_| rng.random::<f64>()).collect();
        let p = joint_probabilities(&vecs, dim, 5.0);

        let total: f64 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "total {total}");
        for i in 0..num {
            for j in 0..num {
                assert_eq!(p[i * num + j], p[j * num + i]);
            }
        }
    }

    #[test]
    fn test_separates_clusters() {
        let mut rng = rand::rng();
        let dim = 8;
        let per_cluster = 20;
        let mut values = Vec::new();
        for cluster in 0..2 {
            let offset = cluster as f64 * 50.0;
            for _ in 0..per_cluster {
                values.extend((0..dim).map(|_| offset + rng.random::<f64>()));
            }
        }
        let features = FeatureTable::with_prefix("f", dim, values);
        let projected = Tsne::new(10.0, 50, 500, 3).project(&features).unwrap();
        assert_eq!(projected.names(), ["TSNE0", "TSNE1"]);
        assert_eq!(projected.rows(), 2 * per_cluster);

        let centroid = |range: std::ops::Range<usize>| {
            let mut c = [0.0, 0.0];
            for i in range {
                c[0] += projected.row(i)[0] / per_cluster as f64;
                c[1] += projected.row(i)[1] / per_cluster as f64;
            }
            c
        };
        let a = centroid(0..per_cluster);
        let b = centroid(per_cluster..2 * per_cluster);
        let between = squared_euclidean(&a, &b);
        for i in 0..per_cluster {
            assert!(squared_euclidean(projected.row(i), &a) < between);
            assert!(squared_euclidean(projected.row(per_cluster + i), &b) < between);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let values: Vec<f64> = (0..60).map(|i| ((i * 7) % 11) as f64).collect();
        let features = FeatureTable::with_prefix("f", 3, values);
        let tsne = Tsne::new(5.0, 50, 100, 42);
        assert_eq!(
            tsne.project(&features).unwrap(),
            tsne.project(&features).unwrap()
        );
    }

    #[test]
    fn test_reduces_wide_input_and_small_input() {
        let values: Vec<f64> = (0..10 * 60).map(|i| ((i * 13) % 17) as f64).collect();
        let features = FeatureTable::with_prefix("f", 60, values);
        let projected = Tsne::new(30.0, 50, 50, 0).project(&features).unwrap();
        assert_eq!(projected.rows(), 10);
        assert_eq!(projected.dim(), 2);

        let single = FeatureTable::with_prefix("f", 2, vec![1.0, 2.0]);
        assert!(matches!(
            Tsne::default().project(&single),
            Err(ProjectionError::TooFewRows { required: 2, .. })
        ));
    }

    #[test]
    fn test_gradient_balances() {
        let mut rng = rand::rng();
        let (num, dim) = (25, 4);
        let vecs: Vec<f64> = (0..num * dim).map(|_| rng.random::<f64>()).collect();
        let p = joint_probabilities(&vecs, dim, 5.0);
        let y: Vec<f64> = (0..num * OUTPUT_DIM).map(|_| rng.random::<f64>()).collect();
        let mut grad = vec![0.0; y.len()];

        let kl = gradient(&p, &y, 1.0, &mut grad);
        assert!(kl.is_finite() && kl >= 0.0, "KL divergence {kl}");
        // pairwise forces cancel out over all points
        for d in 0..OUTPUT_DIM {
            let total: f64 = grad.iter().skip(d).step_by(OUTPUT_DIM).sum();
            assert!(total.abs() < 1e-9, "dimension {d} total {total}");
        }
        let mut again = vec![0.0; y.len()];
        assert_eq!(gradient(&p, &y, 1.0, &mut again), kl);
        assert_eq!(again, grad);
    }

    #[test]
    fn test_too_many_rows() {
        let features = FeatureTable::with_prefix("f", 2, (0..12).map(|i| i as f64).collect());
        assert!(matches!(
            Tsne::default().with_max_rows(5).project(&features),
            Err(ProjectionError::TooManyRows {
                limit: 5,
                actual: 6,
                ..
            })
        ));
        assert!(Tsne::new(2.0, 50, 10, 0).with_max_rows(6).project(&features).is_ok());
    }
}
