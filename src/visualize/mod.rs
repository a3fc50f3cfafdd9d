//! Ways of visualizing labelled feature vectors.

mod export;
mod plot;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub use export::{
    DirectoryExport, ExportConfig, FILENAME_CONFIG_JSON, FILENAME_CONFIG_PBTXT, FILENAME_METADATA,
    FILENAME_SPRITE, FILENAME_TENSORS,
};
pub use plot::{PlotConfig, ScatterPlot};

use crate::features::{FeatureError, LabelledFeatures};
use crate::projection::{ProjectionError, Projector};
use crate::sprite::{SpriteError, TileSize};

/// Errors while visualizing.
#[derive(Debug, Error)]
pub enum VisualizeError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error(transparent)]
    Sprite(#[from] SpriteError),
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize the projector config")]
    Json(#[from] serde_json::Error),
    #[error("failed to draw plot: {0}")]
    Plot(String),
    #[error("a {height}x{width} tile does not fit in a {canvas}x{canvas} sprite")]
    TileExceedsCanvas { height: u32, width: u32, canvas: u32 },
    #[error("a plot needs at least 2 projected dimensions, found {0}")]
    TooFewDimensions(usize),
    #[error("an output path is required for the {0} method")]
    MissingOutput(VisualizationMethod),
    #[error("unknown visualization method `{0}`, expected one of plot, export")]
    UnknownMethod(String),
}

/// Visualizes features in some manner.
pub trait Visualizer {
    fn visualize(&self, features: LabelledFeatures) -> Result<(), VisualizeError>;
}

/// Visualization methods selectable on the command line.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum VisualizationMethod {
    /// Scatter plot of the first two projected dimensions.
    #[default]
    Plot,
    /// Directory for an embedding projector viewer.
    Export,
}

/// Options shared by every visualization method.
#[derive(Debug, Clone, Default)]
pub struct VisualizeOptions {
    /// Plot file or export directory.
    pub output: Option<PathBuf>,
    pub tile_size: TileSize,
    /// Seed for any random sampling; random if `None`.
    pub seed: Option<u64>,
}

impl VisualizationMethod {
    /// Build the visualizer for this method.
    pub fn create(
        self,
        projector: Box<dyn Projector>,
        options: VisualizeOptions,
    ) -> Result<Box<dyn Visualizer>, VisualizeError> {
        match self {
            VisualizationMethod::Plot => {
                let mut config = PlotConfig::default();
                if let Some(output) = options.output {
                    config.output = output;
                }
                Ok(Box::new(ScatterPlot::new(projector, config)))
            }
            VisualizationMethod::Export => {
                let output = options.output.ok_or(VisualizeError::MissingOutput(self))?;
                let config = ExportConfig {
                    tile_size: options.tile_size,
                    seed: options.seed,
                    ..ExportConfig::default()
                };
                Ok(Box::new(DirectoryExport::new(projector, output, config)?))
            }
        }
    }
}

impl FromStr for VisualizationMethod {
    type Err = VisualizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plot" => Ok(VisualizationMethod::Plot),
            "export" | "tensorboard" => Ok(VisualizationMethod::Export),
            _ => Err(VisualizeError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for VisualizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VisualizationMethod::Plot => "plot",
            VisualizationMethod::Export => "export",
        })
    }
}

#[cfg(test)]
mod test {
    use super::{VisualizationMethod, VisualizeError, VisualizeOptions};
    use crate::projection::Identity;

    #[test]
    fn test_parse_method() {
        assert_eq!(
            "TensorBoard".parse::<VisualizationMethod>().unwrap(),
            VisualizationMethod::Export
        );
        assert_eq!(
            "PLOT".parse::<VisualizationMethod>().unwrap(),
            VisualizationMethod::Plot
        );
        assert!("table".parse::<VisualizationMethod>().is_err());
    }

    #[test]
    fn test_export_requires_output() {
        assert!(matches!(
            VisualizationMethod::Export.create(Box::new(Identity), VisualizeOptions::default()),
            Err(VisualizeError::MissingOutput(VisualizationMethod::Export))
        ));
        assert!(
            VisualizationMethod::Plot
                .create(Box::new(Identity), VisualizeOptions::default())
                .is_ok()
        );
    }
}
