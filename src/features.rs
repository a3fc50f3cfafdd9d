//! Load feature vectors from CSV and attach identifiers, labels and image paths.

use std::path::{Component, Path, PathBuf};

use log::info;
use rand::Rng;
use thiserror::Error;

use crate::identifiers::select_or_create_identifiers;
use crate::labels::{DEFAULT_MAX_LABEL_INDEX, labels_from_identifiers};
use crate::sampling::{gather, gather_rows, subsample_indices};
use crate::table::{DEFAULT_DELIMITER, Table, TableError};

/// Placeholder in an image path template that is substituted per row.
pub const PLACEHOLDER_FOR_SUBSTITUTION: &str = "<IMAGE>";

/// Errors while loading or reshaping labelled features.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Table(#[from] TableError),
    /// The table has no numeric column to use as features.
    #[error("no numeric columns found to use as features")]
    NoNumericColumns,
    /// More rows were requested than exist.
    #[error("cannot sample {requested} rows from a table with only {available} rows")]
    InsufficientRows { requested: usize, available: usize },
}

/// Row-major matrix of feature values with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureTable {
    /// Create a table from row-major `values`; its length must be a multiple of `names.len()`.
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        assert!(!names.is_empty(), "a feature table needs at least one column");
        assert_eq!(
            values.len() % names.len(),
            0,
            "values must fill whole rows"
        );
        Self { names, values }
    }

    /// Name columns `<prefix>0`, `<prefix>1`, ...
    pub fn with_prefix(prefix: &str, dim: usize, values: Vec<f64>) -> Self {
        Self::new((0..dim).map(|i| format!("{prefix}{i}")).collect(), values)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.names.len()
    }

    pub fn rows(&self) -> usize {
        self.values.len() / self.dim()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.dim()..(i + 1) * self.dim()]
    }

    pub fn iter_rows(&self) -> std::slice::Chunks<'_, f64> {
        self.values.chunks(self.dim())
    }

    fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            values: gather_rows(&self.values, self.dim(), indices),
        }
    }
}

/// Features with identifiers, labels and optional image paths, all in the same row order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledFeatures {
    pub features: FeatureTable,
    pub identifiers: Vec<String>,
    pub labels: Vec<String>,
    pub image_paths: Option<Vec<PathBuf>>,
}

impl LabelledFeatures {
    pub fn new(
        features: FeatureTable,
        identifiers: Vec<String>,
        labels: Vec<String>,
        image_paths: Option<Vec<PathBuf>>,
    ) -> Self {
        let rows = features.rows();
        assert_eq!(identifiers.len(), rows);
        assert_eq!(labels.len(), rows);
        if let Some(paths) = &image_paths {
            assert_eq!(paths.len(), rows);
        }
        Self {
            features,
            identifiers,
            labels,
            image_paths,
        }
    }

    pub fn number_items(&self) -> usize {
        self.features.rows()
    }

    /// Take the same random subset of rows from every member, keeping source order.
    pub fn sample_without_replacement<R: Rng + ?Sized>(
        self,
        sample_size: usize,
        rng: &mut R,
    ) -> Result<Self, FeatureError> {
        let available = self.number_items();
        if sample_size > available {
            return Err(FeatureError::InsufficientRows {
                requested: sample_size,
                available,
            });
        }
        if sample_size == available {
            return Ok(self);
        }
        let indices = subsample_indices(sample_size, available, rng);
        Ok(Self {
            features: self.features.select_rows(&indices),
            identifiers: gather(&self.identifiers, &indices),
            labels: gather(&self.labels, &indices),
            image_paths: self.image_paths.as_deref().map(|p| gather(p, &indices)),
        })
    }
}

/// Where per-row image paths come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Join or substitute each row identifier into the template.
    Identifier(String),
    /// Join or substitute a six digit row index into the template.
    Sequence(String),
}

/// Options for [`load_features`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: char,
    pub max_label_index: i32,
    pub image_source: Option<ImageSource>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            max_label_index: DEFAULT_MAX_LABEL_INDEX,
            image_source: None,
        }
    }
}

/// Load a CSV file and determine identifiers, labels and image paths.
pub fn load_features(path: &Path, options: &LoadOptions) -> Result<LabelledFeatures, FeatureError> {
    let table = Table::read(path, options.delimiter)?;
    let features = labelled_features(&table, options)?;
    info!(
        "loaded {} items with {} features from {}",
        features.number_items(),
        features.features.dim(),
        path.display()
    );
    Ok(features)
}

/// Build labelled features from an already parsed table.
pub fn labelled_features(
    table: &Table,
    options: &LoadOptions,
) -> Result<LabelledFeatures, FeatureError> {
    let numeric = table.numeric_columns();
    if numeric.is_empty() {
        return Err(FeatureError::NoNumericColumns);
    }

    let names = numeric.iter().map(|c| c.name.clone()).collect();
    let mut values = Vec::with_capacity(table.rows() * numeric.len());
    for row in 0..table.rows() {
        for column in &numeric {
            if let Some(numbers) = &column.numbers {
                values.push(numbers[row]);
            }
        }
    }

    let identifiers = select_or_create_identifiers(table);
    let labels = labels_from_identifiers(&identifiers, options.max_label_index);
    let image_paths = options
        .image_source
        .as_ref()
        .map(|source| image_paths(source, &identifiers));

    Ok(LabelledFeatures::new(
        FeatureTable::new(names, values),
        identifiers,
        labels,
        image_paths,
    ))
}

/// Derive one image path per row.
pub fn image_paths(source: &ImageSource, identifiers: &[String]) -> Vec<PathBuf> {
    match source {
        ImageSource::Identifier(template) => identifiers
            .iter()
            .map(|id| join_or_substitute(template, id))
            .collect(),
        ImageSource::Sequence(template) => (0..identifiers.len())
            .map(|i| join_or_substitute(template, &format!("{i:06}")))
            .collect(),
    }
}

/// Substitute `path` for the first placeholder in `template`, or join it onto `template`.
pub fn join_or_substitute(template: &str, path: &str) -> PathBuf {
    if template.contains(PLACEHOLDER_FOR_SUBSTITUTION) {
        normalize(Path::new(
            &template.replacen(PLACEHOLDER_FOR_SUBSTITUTION, path, 1),
        ))
    } else {
        normalize(&Path::new(template).join(path))
    }
}

/// Drop `.` components and repeated separators.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
