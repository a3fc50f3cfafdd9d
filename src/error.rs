//! Crate-level error.

use thiserror::Error;

use crate::features::FeatureError;
use crate::histogram::HistogramError;
use crate::visualize::VisualizeError;

/// Any failure of a command.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error(transparent)]
    Visualize(#[from] VisualizeError),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
}
