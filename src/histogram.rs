//! Weighted histogram of an `intensity`/`count` CSV, drawn with a logarithmic count axis.

use std::path::{Path, PathBuf};

use log::info;
use plotters::prelude::*;
use thiserror::Error;

use crate::font;
use crate::table::{DEFAULT_DELIMITER, Table, TableError};

pub const COLUMN_KEYS: &str = "intensity";
pub const COLUMN_COUNTS: &str = "count";

/// Errors while building a histogram plot.
#[derive(Debug, Error)]
pub enum HistogramError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("no numeric column named `{0}`")]
    MissingColumn(&'static str),
    #[error("the histogram has no rows")]
    Empty,
    #[error("failed to draw histogram to {path}: {message}")]
    Plot { path: PathBuf, message: String },
}

/// Settings for [`plot_histogram`].
#[derive(Debug, Clone)]
pub struct HistogramOptions {
    pub number_bins: usize,
    pub delimiter: char,
    pub width: u32,
    pub height: u32,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            number_bins: 100,
            delimiter: DEFAULT_DELIMITER,
            width: 1024,
            height: 768,
        }
    }
}

/// One bin `[start, end)`; the last bin also includes `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub total: f64,
}

/// Split `[min(keys), max(keys)]` into equal-width bins and sum the counts in each.
pub fn weighted_bins(keys: &[f64], counts: &[f64], number_bins: usize) -> Vec<Bin> {
    if keys.is_empty() || number_bins == 0 {
        return Vec::new();
    }
    let (min, max) = keys
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &k| {
            (lo.min(k), hi.max(k))
        });
    let width = if max > min { (max - min) / number_bins as f64 } else { 1.0 };

    let mut bins: Vec<Bin> = (0..number_bins)
        .map(|i| Bin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            total: 0.0,
        })
        .collect();
    for (&key, &count) in keys.iter().zip(counts) {
        let index = (((key - min) / width) as usize).min(number_bins - 1);
        bins[index].total += count;
    }
    bins
}

/// Read `intensity` and `count` columns from `csv` and draw their histogram to `output`.
pub fn plot_histogram(
    csv: &Path,
    output: &Path,
    options: &HistogramOptions,
) -> Result<(), HistogramError> {
    let table = Table::read(csv, options.delimiter)?;
    let keys = numeric_column(&table, COLUMN_KEYS)?;
    let counts = numeric_column(&table, COLUMN_COUNTS)?;
    let bins = weighted_bins(keys, counts, options.number_bins);
    if bins.is_empty() {
        return Err(HistogramError::Empty);
    }

    draw(&bins, output, options).map_err(|err| HistogramError::Plot {
        path: output.to_path_buf(),
        message: err.to_string(),
    })?;
    info!("histogram with {} bins written to {}", bins.len(), output.display());
    Ok(())
}

fn numeric_column<'a>(table: &'a Table, name: &'static str) -> Result<&'a [f64], HistogramError> {
    table
        .column(name)
        .and_then(|c| c.numbers.as_deref())
        .ok_or(HistogramError::MissingColumn(name))
}

fn draw(
    bins: &[Bin],
    output: &Path,
    options: &HistogramOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if !font::ensure_registered() {
        return Err("embedded font could not be loaded".into());
    }
    let root = BitMapBackend::new(output, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = bins.first().map_or(0.0, |b| b.start);
    let x_max = bins.last().map_or(1.0, |b| b.end);
    let y_max = bins.iter().map(|b| b.total).fold(1.0_f64, f64::max) * 2.0;
    // log axis cannot start at zero
    let y_min = 0.5;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, (y_min..y_max).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Intensity")
        .y_desc("Count")
        .draw()?;

    chart.draw_series(
        bins.iter()
            .filter(|b| b.total >= 1.0)
            .map(|b| Rectangle::new([(b.start, y_min), (b.end, b.total)], BLUE.mix(0.6).filled())),
    )?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{Bin, weighted_bins};

    #[test]
    fn test_weighted_bins() {
        let keys = [0.0, 1.0, 2.0, 3.0, 4.0];
        let counts = [1.0, 2.0, 3.0, 4.0, 5.0];
        let bins = weighted_bins(&keys, &counts, 2);
        assert_eq!(
            bins,
            vec![
                Bin {
                    start: 0.0,
                    end: 2.0,
                    total: 3.0
                },
                Bin {
                    start: 2.0,
                    end: 4.0,
                    total: 12.0
                },
            ]
        );
    }

    #[test]
    fn test_weighted_bins_edge_cases() {
        assert!(weighted_bins(&[], &[], 10).is_empty());
        let single = weighted_bins(&[7.0, 7.0], &[2.0, 3.0], 4);
        assert_eq!(single.len(), 4);
        assert_eq!(single[0].total, 5.0);
        assert_eq!(single.iter().map(|b| b.total).sum::<f64>(), 5.0);
    }
}
