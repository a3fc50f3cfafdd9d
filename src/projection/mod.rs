//! Project feature tables to lower dimensionality.

mod pca;
mod tsne;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use pca::Pca;
pub use tsne::Tsne;

use crate::features::FeatureTable;

/// Errors from a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{method} needs at least {required} rows, found {actual}")]
    TooFewRows {
        method: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("{method} handles at most {limit} rows, found {actual}; use PCA for larger inputs")]
    TooManyRows {
        method: &'static str,
        limit: usize,
        actual: usize,
    },
    #[error("cannot project {dim} features from {rows} rows onto {components} components")]
    InvalidComponents {
        components: usize,
        rows: usize,
        dim: usize,
    },
    #[error("eigendecomposition failed: {0}")]
    Decomposition(String),
    #[error("unknown projection method `{0}`, expected one of t-SNE, PCA, none")]
    UnknownMethod(String),
}

/// Maps a feature table to another with identical rows and order, but different columns.
pub trait Projector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn project(&self, features: &FeatureTable) -> Result<FeatureTable, ProjectionError>;
}

/// Leaves the features unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Projector for Identity {
    fn name(&self) -> &'static str {
        "none"
    }

    fn project(&self, features: &FeatureTable) -> Result<FeatureTable, ProjectionError> {
        Ok(features.clone())
    }
}

/// Projection methods selectable on the command line.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum ProjectionMethod {
    #[default]
    Tsne,
    Pca,
    None,
}

impl ProjectionMethod {
    /// Build the projector with its default settings; `seed` drives any randomness.
    pub fn create(self, seed: u64) -> Box<dyn Projector> {
        match self {
            ProjectionMethod::Tsne => Box::new(Tsne::default().with_seed(seed)),
            ProjectionMethod::Pca => Box::new(Pca::default()),
            ProjectionMethod::None => Box::new(Identity),
        }
    }
}

impl FromStr for ProjectionMethod {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "t-sne" | "tsne" => Ok(ProjectionMethod::Tsne),
            "pca" => Ok(ProjectionMethod::Pca),
            "none" => Ok(ProjectionMethod::None),
            _ => Err(ProjectionError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProjectionMethod::Tsne => "t-SNE",
            ProjectionMethod::Pca => "PCA",
            ProjectionMethod::None => "none",
        })
    }
}
