//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use vcount_calibrate::{DisplayPoint, DisplaySize};
use vcount_models::{CountingLine, Direction, JobKind, Orientation, Thresholds};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "VCOUNT_BACKEND_URL")]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a video and follow the job until it finishes
    Run(RunArgs),
    /// Place a counting line on the first frame of a video
    Calibrate(CalibrateArgs),
    /// Check the backend is reachable
    Health,
    /// Download the results CSV of the last job
    DownloadCsv {
        /// Destination file
        #[arg(long, short)]
        out: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum KindArg {
    Plates,
    Vehicles,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Plates => JobKind::PlateReading,
            KindArg::Vehicles => JobKind::VehicleCounting,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Video file to process
    #[arg(long)]
    pub video: PathBuf,

    #[arg(long, value_enum, default_value = "vehicles")]
    pub kind: KindArg,

    /// Results file name; defaults to the video file stem
    #[arg(long)]
    pub output_name: Option<String>,

    /// Wall-clock time the recording started
    #[arg(long)]
    pub start_time: String,

    /// Traffic direction (entrada, sortida)
    #[arg(long, default_value = "entrada", value_parser = parse_direction)]
    pub direction: Direction,

    /// Camera orientation (nord, sud, est, oest)
    #[arg(long, default_value = "nord", value_parser = parse_orientation)]
    pub orientation: Orientation,

    #[arg(long, default_value_t = Thresholds::DEFAULT_MOTION)]
    pub motion_threshold: u8,

    #[arg(long, default_value_t = Thresholds::DEFAULT_CONFIDENCE)]
    pub confidence_threshold: u8,

    /// Counting line in native frame pixels: x1,y1,x2,y2
    #[arg(long, value_parser = parse_line)]
    pub line: Option<CountingLine>,

    /// Skip the local duration probe
    #[arg(long)]
    pub no_probe: bool,

    /// Print the final results as JSON
    #[arg(long)]
    pub json: bool,

    /// Case-insensitive filter applied to the printed results
    #[arg(long)]
    pub search: Option<String>,

    /// Sort field for the printed results
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long, default_value = "desc")]
    pub order: String,
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Video whose first frame is used as reference
    #[arg(long)]
    pub video: PathBuf,

    /// Click positions in display coordinates: x,y (give exactly two)
    #[arg(long = "click", value_parser = parse_point, num_args = 1)]
    pub clicks: Vec<DisplayPoint>,

    /// Size the frame is displayed at: WIDTHxHEIGHT (natural size if omitted)
    #[arg(long, value_parser = parse_size)]
    pub display: Option<DisplaySize>,

    /// Where to write the annotated frame
    #[arg(long, default_value = "calibration.png")]
    pub preview: PathBuf,
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    Direction::parse(s).ok_or_else(|| format!("unknown direction '{}'", s))
}

fn parse_orientation(s: &str) -> Result<Orientation, String> {
    Orientation::parse(s).ok_or_else(|| format!("unknown orientation '{}'", s))
}

fn parse_numbers<const N: usize>(s: &str, separator: char) -> Result<[f64; N], String> {
    let values: Vec<f64> = s
        .split(separator)
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("'{}': {}", s, e))?;
    values
        .try_into()
        .map_err(|_| format!("'{}': expected {} values", s, N))
}

fn parse_line(s: &str) -> Result<CountingLine, String> {
    let [x1, y1, x2, y2] = parse_numbers::<4>(s, ',')?;
    Ok(CountingLine::new(x1, y1, x2, y2))
}

fn parse_point(s: &str) -> Result<DisplayPoint, String> {
    let [x, y] = parse_numbers::<2>(s, ',')?;
    Ok(DisplayPoint::new(x, y))
}

fn parse_size(s: &str) -> Result<DisplaySize, String> {
    let [width, height] = parse_numbers::<2>(&s.to_lowercase(), 'x')?;
    Ok(DisplaySize::new(width, height))
}
