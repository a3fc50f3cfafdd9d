use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use argh::FromArgs;
use embedviz::Error;
use embedviz::features::{ImageSource, LoadOptions, load_features};
use embedviz::histogram::{HistogramOptions, plot_histogram};
use embedviz::labels::DEFAULT_MAX_LABEL_INDEX;
use embedviz::projection::ProjectionMethod;
use embedviz::sprite::TileSize;
use embedviz::table::DEFAULT_DELIMITER;
use embedviz::visualize::{VisualizationMethod, VisualizeOptions};
use log::{LevelFilter, error};
use logforth::append;

#[derive(FromArgs)]
/// Visualize feature vectors stored in a CSV file.
struct Cli {
    /// log debug messages (overridden by RUST_LOG)
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Visualize(VisualizeArgs),
    Histogram(HistogramArgs),
}

#[derive(FromArgs)]
/// Project the numeric columns of a CSV file and plot or export them.
#[argh(subcommand, name = "visualize")]
struct VisualizeArgs {
    /// path to a UTF-8 CSV file with a header row (convert other encodings first)
    #[argh(positional)]
    csv: PathBuf,

    /// visualization method: plot (default) or export
    #[argh(option, short = 'm', default = "VisualizationMethod::default()")]
    method: VisualizationMethod,

    /// projection method: t-SNE (default), PCA or none
    #[argh(option, short = 'p', default = "ProjectionMethod::default()")]
    projection: ProjectionMethod,

    /// plot file or export directory
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// directory of thumbnails named by identifier, or a path where <IMAGE> is replaced by it
    #[argh(option)]
    image_path: Option<String>,

    /// path where <IMAGE> is replaced by a six digit row index (000000, 000001, ...)
    #[argh(option)]
    image_sequence: Option<String>,

    /// groups to keep in a label from the left (if positive) or to drop from the right (if negative)
    #[argh(option, short = 'l', default = "DEFAULT_MAX_LABEL_INDEX")]
    max_label_index: i32,

    /// field delimiter of the CSV file
    #[argh(option, short = 'd', default = "DEFAULT_DELIMITER")]
    delimiter: char,

    /// height of each thumbnail in the sprite
    #[argh(option, default = "64")]
    tile_height: u32,

    /// width of each thumbnail in the sprite
    #[argh(option, default = "64")]
    tile_width: u32,

    /// seed for t-SNE initialisation and row sampling
    #[argh(option)]
    seed: Option<u64>,
}

#[derive(FromArgs)]
/// Plot a histogram from a CSV file with `intensity` and `count` columns.
#[argh(subcommand, name = "histogram")]
struct HistogramArgs {
    /// path to a UTF-8 CSV file
    #[argh(positional)]
    csv: PathBuf,

    /// output PNG path (defaults to the CSV path with a .png extension)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// number of bins
    #[argh(option, default = "100")]
    bins: usize,
}

fn init_logger(verbose: bool) {
    let default = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let level = env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(default);
    logforth::builder()
        .dispatch(|d| d.filter(level).append(append::Stderr::default()))
        .apply();
}

/// `dir/stem_projection.png` next to the CSV file.
fn default_plot_path(csv: &Path) -> PathBuf {
    let stem = csv
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "features".to_string());
    csv.with_file_name(format!("{stem}_projection.png"))
}

fn visualize(args: VisualizeArgs) -> Result<(), Error> {
    let tile_size = TileSize::new(args.tile_height, args.tile_width)
        .map_err(embedviz::visualize::VisualizeError::from)?;
    let image_source = match (args.image_path, args.image_sequence) {
        (Some(path), _) => Some(ImageSource::Identifier(path)),
        (None, Some(sequence)) => Some(ImageSource::Sequence(sequence)),
        (None, None) => None,
    };
    let load_options = LoadOptions {
        delimiter: args.delimiter,
        max_label_index: args.max_label_index,
        image_source,
    };
    let output = match args.method {
        VisualizationMethod::Plot => Some(args.output.unwrap_or_else(|| default_plot_path(&args.csv))),
        VisualizationMethod::Export => args.output,
    };

    let projector = args.projection.create(args.seed.unwrap_or(0));
    let visualizer = args.method.create(
        projector,
        VisualizeOptions {
            output,
            tile_size,
            seed: args.seed,
        },
    )?;
    let features = load_features(&args.csv, &load_options)?;
    visualizer.visualize(features)?;
    Ok(())
}

fn histogram(args: HistogramArgs) -> Result<(), Error> {
    let output = args.output.unwrap_or_else(|| args.csv.with_extension("png"));
    let options = HistogramOptions {
        number_bins: args.bins,
        ..HistogramOptions::default()
    };
    plot_histogram(&args.csv, &output, &options)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli: Cli = argh::from_env();
    init_logger(cli.verbose);

    let result = match cli.command {
        Command::Visualize(args) => visualize(args),
        Command::Histogram(args) => histogram(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut message = err.to_string();
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                message.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}
