//! Scatter plot of projected features, coloured by label.

use std::path::PathBuf;

use log::info;
use plotters::prelude::*;

use super::{VisualizeError, Visualizer};
use crate::features::LabelledFeatures;
use crate::font;
use crate::projection::Projector;

/// Where and how large to draw the plot.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub point_radius: i32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("projection.png"),
            width: 1024,
            height: 768,
            point_radius: 3,
        }
    }
}

/// Projects the features and plots the first two dimensions.
pub struct ScatterPlot {
    projector: Box<dyn Projector>,
    config: PlotConfig,
}

impl ScatterPlot {
    pub fn new(projector: Box<dyn Projector>, config: PlotConfig) -> Self {
        Self { projector, config }
    }
}

impl Visualizer for ScatterPlot {
    fn visualize(&self, features: LabelledFeatures) -> Result<(), VisualizeError> {
        let projected = self.projector.project(&features.features)?;
        if projected.dim() < 2 {
            return Err(VisualizeError::TooFewDimensions(projected.dim()));
        }
        let points: Vec<(f64, f64)> = projected.iter_rows().map(|row| (row[0], row[1])).collect();
        let groups = group_by_label(&features.labels);

        draw(
            &self.config,
            (&projected.names()[0], &projected.names()[1]),
            &points,
            &groups,
        )
        .map_err(|err| VisualizeError::Plot(err.to_string()))?;
        info!(
            "plotted {} points projected with {} to {}",
            points.len(),
            self.projector.name(),
            self.config.output.display()
        );
        Ok(())
    }
}

/// Row indices per distinct label, in order of first appearance.
fn group_by_label(labels: &[String]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        match groups.iter_mut().find(|(name, _)| *name == label.as_str()) {
            Some((_, rows)) => rows.push(i),
            None => groups.push((label.as_str(), vec![i])),
        }
    }
    groups
}

/// Pad a range so single points and identical values still get a visible axis.
fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return -1.0..1.0;
    }
    let pad = ((max - min) * 0.05).max(1e-6);
    (min - pad)..(max + pad)
}

fn draw(
    config: &PlotConfig,
    axes: (&str, &str),
    points: &[(f64, f64)],
    groups: &[(&str, Vec<usize>)],
) -> Result<(), Box<dyn std::error::Error>> {
    if !font::ensure_registered() {
        return Err("embedded font could not be loaded".into());
    }
    let root =
        BitMapBackend::new(&config.output, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_range = padded_range(points.iter().map(|p| p.0));
    let y_range = padded_range(points.iter().map(|p| p.1));
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(axes.0)
        .y_desc(axes.1)
        .draw()?;

    for (index, (label, rows)) in groups.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();
        let radius = config.point_radius;
        chart
            .draw_series(
                rows.iter()
                    .map(|&i| Circle::new(points[i], radius, color.filled())),
            )?
            .label(*label)
            .legend(move |(x, y)| Circle::new((x, y), radius, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
