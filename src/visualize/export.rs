//! Export a directory for an embedding projector viewer.
//!
//! The directory holds the projected vectors, a label manifest, a projector
//! config (both the TensorBoard text format and the standalone JSON format) and,
//! when every row has an image, a sprite of thumbnails.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use super::{VisualizeError, Visualizer};
use crate::features::{FeatureTable, LabelledFeatures};
use crate::projection::Projector;
use crate::sprite::{self, TileSize};

pub const FILENAME_METADATA: &str = "metadata.tsv";
pub const FILENAME_TENSORS: &str = "tensors.tsv";
pub const FILENAME_SPRITE: &str = "sprite.png";
pub const FILENAME_CONFIG_PBTXT: &str = "projector_config.pbtxt";
pub const FILENAME_CONFIG_JSON: &str = "projector_config.json";

const TENSOR_NAME: &str = "embedding";
const COLUMN_IDENTIFIER: &str = "Identifier";
const COLUMN_LABEL: &str = "Label";

/// Settings for [`DirectoryExport`].
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Size of each thumbnail in the sprite.
    pub tile_size: TileSize,
    /// Largest sprite side the viewer accepts, in pixels.
    pub max_canvas: u32,
    /// Seed for sampling rows when there are too many thumbnails; random if `None`.
    pub seed: Option<u64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tile_size: TileSize::default(),
            max_canvas: 8192,
            seed: None,
        }
    }
}

impl ExportConfig {
    /// Tiles along each side of the largest square grid that fits in the canvas.
    pub fn max_grid_side(&self) -> usize {
        (self.max_canvas / self.tile_size.height()).min(self.max_canvas / self.tile_size.width())
            as usize
    }

    /// Most thumbnails that fit in one sprite.
    pub fn max_images(&self) -> usize {
        let side = self.max_grid_side();
        side * side
    }
}

/// Writes projected features, labels and an optional sprite into a directory.
pub struct DirectoryExport {
    projector: Box<dyn Projector>,
    output: PathBuf,
    config: ExportConfig,
}

impl DirectoryExport {
    /// Create the exporter, creating `output` if it does not exist.
    pub fn new(
        projector: Box<dyn Projector>,
        output: PathBuf,
        config: ExportConfig,
    ) -> Result<Self, VisualizeError> {
        if config.max_images() == 0 {
            return Err(VisualizeError::TileExceedsCanvas {
                height: config.tile_size.height(),
                width: config.tile_size.width(),
                canvas: config.max_canvas,
            });
        }
        fs::create_dir_all(&output).map_err(|source| VisualizeError::Io {
            path: output.clone(),
            source,
        })?;
        Ok(Self {
            projector,
            output,
            config,
        })
    }

    fn resolve(&self, file_name: &str) -> PathBuf {
        self.output.join(file_name)
    }

    /// Randomly sample rows so every thumbnail fits in the sprite.
    fn sample_if_needed(
        &self,
        features: LabelledFeatures,
    ) -> Result<LabelledFeatures, VisualizeError> {
        if features.image_paths.is_none() {
            return Ok(features);
        }
        let rows = features.number_items();
        let max = self.config.max_images();
        if rows <= max {
            return Ok(features);
        }
        info!("sampling {max} rows from a total of {rows} rows, the most a sprite can hold");
        let sampled = match self.config.seed {
            Some(seed) => {
                features.sample_without_replacement(max, &mut StdRng::seed_from_u64(seed))
            }
            None => features.sample_without_replacement(max, &mut rand::rng()),
        }?;
        Ok(sampled)
    }
}

impl Visualizer for DirectoryExport {
    fn visualize(&self, features: LabelledFeatures) -> Result<(), VisualizeError> {
        info!("exporting projector files to {}", self.output.display());
        let features = self.sample_if_needed(features)?;

        write_file(
            &self.resolve(FILENAME_METADATA),
            &metadata_tsv(&features.identifiers, &features.labels),
        )?;

        let projected = self.projector.project(&features.features)?;
        write_file(&self.resolve(FILENAME_TENSORS), &tensors_tsv(&projected))?;

        let sprite = match &features.image_paths {
            Some(paths) if !paths.is_empty() => {
                sprite::compose(paths, self.config.tile_size, &self.resolve(FILENAME_SPRITE))?;
                Some(FILENAME_SPRITE)
            }
            _ => None,
        };

        let config = ProjectorConfig::new(&projected, sprite, self.config.tile_size);
        write_file(&self.resolve(FILENAME_CONFIG_PBTXT), &config.to_pbtxt())?;
        write_file(
            &self.resolve(FILENAME_CONFIG_JSON),
            &serde_json::to_string_pretty(&config)?,
        )?;
        info!(
            "exported {} items with {} dimensions projected with {}",
            projected.rows(),
            projected.dim(),
            self.projector.name()
        );
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), VisualizeError> {
    fs::write(path, contents).map_err(|source| VisualizeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Tabs and line breaks would break the TSV layout.
fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// `Identifier\tLabel` header, then one line per item.
fn metadata_tsv(identifiers: &[String], labels: &[String]) -> String {
    let mut tsv = format!("{COLUMN_IDENTIFIER}\t{COLUMN_LABEL}\n");
    for (identifier, label) in identifiers.iter().zip(labels) {
        tsv.push_str(&format!("{}\t{}\n", sanitize(identifier), sanitize(label)));
    }
    tsv
}

/// One tab-separated vector per line, no header.
fn tensors_tsv(features: &FeatureTable) -> String {
    features
        .iter_rows()
        .map(|row| {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            line.join("\t") + "\n"
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpriteConfig {
    image_path: String,
    single_image_dim: [u32; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingConfig {
    tensor_name: String,
    tensor_shape: [usize; 2],
    tensor_path: String,
    metadata_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sprite: Option<SpriteConfig>,
}

#[derive(Debug, Serialize)]
struct ProjectorConfig {
    embeddings: Vec<EmbeddingConfig>,
}

impl ProjectorConfig {
    fn new(projected: &FeatureTable, sprite: Option<&str>, tile_size: TileSize) -> Self {
        Self {
            embeddings: vec![EmbeddingConfig {
                tensor_name: TENSOR_NAME.to_string(),
                tensor_shape: [projected.rows(), projected.dim()],
                tensor_path: FILENAME_TENSORS.to_string(),
                metadata_path: FILENAME_METADATA.to_string(),
                sprite: sprite.map(|image_path| SpriteConfig {
                    image_path: image_path.to_string(),
                    single_image_dim: [tile_size.width(), tile_size.height()],
                }),
            }],
        }
    }

    /// Protobuf text format read by the TensorBoard projector plugin.
    fn to_pbtxt(&self) -> String {
        let mut text = String::new();
        for embedding in &self.embeddings {
            text.push_str("embeddings {\n");
            text.push_str(&format!("  tensor_name: \"{}\"\n", embedding.tensor_name));
            text.push_str(&format!("  tensor_path: \"{}\"\n", embedding.tensor_path));
            text.push_str(&format!("  metadata_path: \"{}\"\n", embedding.metadata_path));
            if let Some(sprite) = &embedding.sprite {
                text.push_str("  sprite {\n");
                text.push_str(&format!("    image_path: \"{}\"\n", sprite.image_path));
                for dim in sprite.single_image_dim {
                    text.push_str(&format!("    single_image_dim: {dim}\n"));
                }
                text.push_str("  }\n");
            }
            text.push_str("}\n");
        }
        text
    }
}

#[cfg(test)]
mod test {
    use super::{DirectoryExport, ExportConfig, ProjectorConfig, metadata_tsv, tensors_tsv};
    use crate::projection::Identity;
    use crate::visualize::VisualizeError;
    use crate::features::FeatureTable;
    use crate::sprite::TileSize;

    #[test]
    fn test_max_images() {
        assert_eq!(ExportConfig::default().max_images(), 128 * 128);
        let config = ExportConfig {
            tile_size: TileSize::new(100, 50).unwrap(),
            max_canvas: 1000,
            seed: None,
        };
        assert_eq!(config.max_grid_side(), 10);
        assert_eq!(config.max_images(), 10 * 10);
    }

    #[test]
    fn test_tile_larger_than_canvas() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ExportConfig {
            tile_size: TileSize::new(64, 32).unwrap(),
            max_canvas: 48,
            seed: None,
        };
        assert_eq!(config.max_images(), 0);
        assert!(matches!(
            DirectoryExport::new(Box::new(Identity), dir.path().join("out"), config),
            Err(VisualizeError::TileExceedsCanvas {
                height: 64,
                width: 32,
                canvas: 48
            })
        ));
    }

    #[test]
    fn test_tsv() {
        let ids = vec!["a/1".to_string(), "b\t2".to_string()];
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            metadata_tsv(&ids, &labels),
            "Identifier\tLabel\na/1\ta\nb 2\tb\n"
        );

        let table = FeatureTable::with_prefix("PCA", 2, vec![1.0, -0.5, 2.25, 3.0]);
        assert_eq!(tensors_tsv(&table), "1\t-0.5\n2.25\t3\n");
    }

    #[test]
    fn test_projector_config() {
        let table = FeatureTable::with_prefix("PCA", 2, vec![0.0; 6]);
        let config = ProjectorConfig::new(&table, Some("sprite.png"), TileSize::new(32, 16).unwrap());
        let pbtxt = config.to_pbtxt();
        assert!(pbtxt.starts_with("embeddings {\n"));
        assert!(pbtxt.contains("  tensor_path: \"tensors.tsv\"\n"));
        assert!(pbtxt.contains("    single_image_dim: 16\n    single_image_dim: 32\n"));

        let json: serde_json::Value = serde_json::to_value(&config).unwrap();
        let embedding = &json["embeddings"][0];
        assert_eq!(embedding["tensorShape"], serde_json::json!([3, 2]));
        assert_eq!(embedding["metadataPath"], "metadata.tsv");
        assert_eq!(embedding["sprite"]["singleImageDim"], serde_json::json!([16, 32]));

        let without = ProjectorConfig::new(&table, None, TileSize::default());
        assert!(!without.to_pbtxt().contains("sprite"));
        let json = serde_json::to_value(&without).unwrap();
        assert!(json["embeddings"][0].get("sprite").is_none());
    }
}
