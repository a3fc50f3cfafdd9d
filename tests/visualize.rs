use std::fs;
use std::path::Path;

use embedviz::features::{FeatureTable, ImageSource, LabelledFeatures, LoadOptions, load_features};
use embedviz::histogram::{HistogramError, HistogramOptions, plot_histogram};
use embedviz::projection::{Identity, ProjectionMethod};
use embedviz::sprite::TileSize;
use embedviz::visualize::{
    DirectoryExport, ExportConfig, FILENAME_CONFIG_JSON, FILENAME_CONFIG_PBTXT, FILENAME_METADATA,
    FILENAME_SPRITE, FILENAME_TENSORS, VisualizationMethod, VisualizeOptions, Visualizer,
};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

const CSV: &str = "\
name,x,y,z
cats/001.png,1.0,2.0,0.5
cats/002.png,1.5,2.5,0.0
dogs/001.png,8.0,9.0,1.0
dogs/002.png,8.5,9.5,1.5
";

fn write_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("features.csv");
    fs::write(&path, CSV).unwrap();
    path
}

#[test]
fn test_export_without_images() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());
    let output = dir.path().join("export");

    let features = load_features(&csv, &LoadOptions::default()).unwrap();
    let visualizer = VisualizationMethod::Export
        .create(
            ProjectionMethod::Pca.create(0),
            VisualizeOptions {
                output: Some(output.clone()),
                ..VisualizeOptions::default()
            },
        )
        .unwrap();
    visualizer.visualize(features).unwrap();

    let metadata = fs::read_to_string(output.join(FILENAME_METADATA)).unwrap();
    assert_eq!(
        metadata,
        "Identifier\tLabel\ncats/001.png\tcats\ncats/002.png\tcats\ndogs/001.png\tdogs\ndogs/002.png\tdogs\n"
    );
    let tensors = fs::read_to_string(output.join(FILENAME_TENSORS)).unwrap();
    assert_eq!(tensors.lines().count(), 4);
    assert!(tensors.lines().all(|line| line.split('\t').count() == 2));
    assert!(!output.join(FILENAME_SPRITE).exists());

    let pbtxt = fs::read_to_string(output.join(FILENAME_CONFIG_PBTXT)).unwrap();
    assert!(!pbtxt.contains("sprite"));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.join(FILENAME_CONFIG_JSON)).unwrap())
            .unwrap();
    assert_eq!(json["embeddings"][0]["tensorShape"], serde_json::json!([4, 2]));
}

#[test]
fn test_export_with_sprite() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());
    let images = dir.path().join("images");
    for (i, id) in ["cats/001.png", "cats/002.png", "dogs/001.png"].iter().enumerate() {
        let path = images.join(id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(10, 10, Rgb([50 * i as u8, 0, 0]))
            .save(&path)
            .unwrap();
    }
    // dogs/002.png is missing and becomes a black tile
    let output = dir.path().join("export");

    let options = LoadOptions {
        image_source: Some(ImageSource::Identifier(
            images.to_string_lossy().into_owned(),
        )),
        ..LoadOptions::default()
    };
    let features = load_features(&csv, &options).unwrap();
    VisualizationMethod::Export
        .create(
            ProjectionMethod::None.create(0),
            VisualizeOptions {
                output: Some(output.clone()),
                tile_size: TileSize::new(8, 8).unwrap(),
                seed: Some(7),
            },
        )
        .unwrap()
        .visualize(features)
        .unwrap();

    let sprite = image::open(output.join(FILENAME_SPRITE)).unwrap().to_rgb8();
    assert_eq!(sprite.dimensions(), (16, 16));
    assert_eq!(sprite.get_pixel(12, 12).0, [0, 0, 0]);
    assert_eq!(sprite.get_pixel(12, 4).0, [50, 0, 0]);

    let tensors = fs::read_to_string(output.join(FILENAME_TENSORS)).unwrap();
    assert_eq!(tensors.lines().next(), Some("1\t2\t0.5"));
    let pbtxt = fs::read_to_string(output.join(FILENAME_CONFIG_PBTXT)).unwrap();
    assert!(pbtxt.contains("image_path: \"sprite.png\""));
    assert!(pbtxt.contains("single_image_dim: 8"));
}

#[test]
fn test_export_samples_rows_to_fit_canvas() {
    let dir = TempDir::new().unwrap();
    let images = dir.path().join("images");
    fs::create_dir_all(&images).unwrap();
    let rows = 40;
    let mut paths = Vec::with_capacity(rows);
    for i in 0..rows {
        let path = images.join(format!("{i:06}.png"));
        RgbImage::from_pixel(6, 6, Rgb([i as u8, 100, 200]))
            .save(&path)
            .unwrap();
        paths.push(path);
    }
    let identifiers: Vec<String> = (0..rows).map(|i| format!("group{}/{i}", i % 3)).collect();
    let labels: Vec<String> = (0..rows).map(|i| format!("group{}", i % 3)).collect();
    let values = (0..rows * 2).map(|v| v as f64).collect();
    let features = LabelledFeatures::new(
        FeatureTable::with_prefix("f", 2, values),
        identifiers,
        labels,
        Some(paths),
    );

    let output = dir.path().join("export");
    let config = ExportConfig {
        tile_size: TileSize::new(10, 5).unwrap(),
        max_canvas: 20,
        seed: Some(3),
    };
    assert_eq!(config.max_images(), 4);
    DirectoryExport::new(Box::new(Identity), output.clone(), config)
        .unwrap()
        .visualize(features)
        .unwrap();

    let metadata = fs::read_to_string(output.join(FILENAME_METADATA)).unwrap();
    assert_eq!(metadata.lines().count(), 1 + 4);
    let tensors = fs::read_to_string(output.join(FILENAME_TENSORS)).unwrap();
    assert_eq!(tensors.lines().count(), 4);
    // sampled rows keep their source order
    let firsts: Vec<f64> = tensors
        .lines()
        .map(|line| line.split('\t').next().unwrap().parse().unwrap())
        .collect();
    assert!(firsts.windows(2).all(|w| w[0] < w[1]));

    let sprite = image::open(output.join(FILENAME_SPRITE)).unwrap();
    assert_eq!((sprite.width(), sprite.height()), (10, 20));
    assert!(sprite.width() <= 20 && sprite.height() <= 20);
}

#[test]
fn test_plot_writes_png() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(dir.path());
    let output = dir.path().join("plot.png");

    let features = load_features(&csv, &LoadOptions::default()).unwrap();
    VisualizationMethod::Plot
        .create(
            ProjectionMethod::Pca.create(0),
            VisualizeOptions {
                output: Some(output.clone()),
                ..VisualizeOptions::default()
            },
        )
        .unwrap()
        .visualize(features)
        .unwrap();

    let plot = image::open(&output).unwrap();
    assert_eq!((plot.width(), plot.height()), (1024, 768));
}

#[test]
fn test_histogram() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("histogram.csv");
    let rows: String = (0..50).map(|i| format!("{i},{}\n", i * 10 + 1)).collect();
    fs::write(&csv, format!("intensity,count\n{rows}")).unwrap();
    let output = dir.path().join("histogram.png");

    plot_histogram(&csv, &output, &HistogramOptions::default()).unwrap();
    assert!(image::open(&output).is_ok());

    let missing = dir.path().join("missing.csv");
    fs::write(&missing, "intensity,total\n1,2\n").unwrap();
    assert!(matches!(
        plot_histogram(&missing, &output, &HistogramOptions::default()),
        Err(HistogramError::MissingColumn("count"))
    ));
}
