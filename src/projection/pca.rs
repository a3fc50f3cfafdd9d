//! Principal component analysis.

use faer::{Mat, Side};
use log::{debug, info};

use super::{ProjectionError, Projector};
use crate::distance::center;
use crate::features::FeatureTable;

/// Projects onto the leading principal components, producing `PCA0`, `PCA1`, ...
#[derive(Debug, Clone, Copy)]
pub struct Pca {
    components: usize,
}

impl Default for Pca {
    fn default() -> Self {
        Self { components: 2 }
    }
}

impl Pca {
    /// Create a PCA projection to `components` dimensions.
    pub fn new(components: usize) -> Self {
        if components < 1 {
            panic!("components must be greater than 0");
        }
        Self { components }
    }

    pub fn components(&self) -> usize {
        self.components
    }
}

impl Projector for Pca {
    fn name(&self) -> &'static str {
        "PCA"
    }

    fn project(&self, features: &FeatureTable) -> Result<FeatureTable, ProjectionError> {
        let (rows, dim) = (features.rows(), features.dim());
        if self.components > rows.min(dim) {
            return Err(ProjectionError::InvalidComponents {
                components: self.components,
                rows,
                dim,
            });
        }

        let mut centered = features.values().to_vec();
        center(&mut centered, dim);

        let axes = principal_axes(&centered, dim)?;
        let total_variance: f64 = axes.iter().map(|a| a.variance).sum();
        let kept = &axes[..self.components];
        if total_variance > 0.0 {
            let explained: f64 = kept.iter().map(|a| a.variance).sum::<f64>() / total_variance;
            info!("PCA: total explained variation {explained:.4}");
        }

        let mut projected = Vec::with_capacity(rows * self.components);
        for vec in centered.chunks(dim) {
            for axis in kept {
                projected.push(vec.iter().zip(&axis.direction).map(|(v, d)| v * d).sum());
            }
        }
        Ok(FeatureTable::with_prefix("PCA", self.components, projected))
    }
}

/// A unit eigenvector of the covariance matrix and the variance along it.
#[derive(Debug)]
struct Axis {
    direction: Vec<f64>,
    variance: f64,
}

/// Eigen-decompose the covariance of centered row-major vectors, sorted by decreasing variance.
fn principal_axes(centered: &[f64], dim: usize) -> Result<Vec<Axis>, ProjectionError> {
    let covariance = covariance(centered, dim);
    let matrix = Mat::from_fn(dim, dim, |i, j| covariance[i * dim + j]);
    let eigen = matrix
        .self_adjoint_eigen(Side::Lower)
        .map_err(|err| ProjectionError::Decomposition(format!("{err:?}")))?;
    let vectors = eigen.U();

    let mut axes: Vec<Axis> = (0..dim)
        .map(|k| {
            let mut direction: Vec<f64> = (0..dim).map(|i| vectors[(i, k)]).collect();
            flip_sign(&mut direction);
            let variance = rayleigh_quotient(&covariance, dim, &direction);
            Axis {
                direction,
                variance,
            }
        })
        .collect();
    axes.sort_by(|a, b| b.variance.total_cmp(&a.variance));
    debug!(
        "PCA: variances {:?}",
        axes.iter().map(|a| a.variance).collect::<Vec<_>>()
    );
    Ok(axes)
}

/// Sample covariance, `dim * dim` row-major.
fn covariance(centered: &[f64], dim: usize) -> Vec<f64> {
    let rows = centered.len() / dim;
    let mut cov = vec![0.0; dim * dim];
    for vec in centered.chunks(dim) {
        for i in 0..dim {
            for j in i..dim {
                cov[i * dim + j] += vec[i] * vec[j];
            }
        }
    }
    let divider = (rows.max(2) - 1) as f64;
    for i in 0..dim {
        for j in i..dim {
            let value = cov[i * dim + j] / divider;
            cov[i * dim + j] = value;
            cov[j * dim + i] = value;
        }
    }
    cov
}

/// `v^T C v` for unit `v`.
fn rayleigh_quotient(matrix: &[f64], dim: usize, v: &[f64]) -> f64 {
    matrix
        .chunks(dim)
        .zip(v)
        .map(|(row, &vi)| vi * row.iter().zip(v).map(|(m, vj)| m * vj).sum::<f64>())
        .sum()
}

/// Make the largest-magnitude entry positive so results do not depend on solver signs.
fn flip_sign(direction: &mut [f64]) {
    let pivot = direction
        .iter()
        .copied()
        .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    if pivot < 0.0 {
        direction.iter_mut().for_each(|v| *v = -*v);
    }
}
