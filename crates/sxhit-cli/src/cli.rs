use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "sxhit - offline parallel hit finding for serial-crystallography diffraction frames.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a range of frames in parallel and report the hit rate.
    Run(RunArgs),
    /// Write the scoring configuration for a dataset without scoring anything.
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the dataset's master metadata file (master.toml).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub master: PathBuf,

    /// Path to a pixel mask. Defaults to pixel_mask.raw next to the master file, if present.
    #[arg(short = 'M', long, value_name = "PATH")]
    pub mask: Option<PathBuf>,

    /// First frame to score (1-based).
    #[arg(short, long, value_name = "INT")]
    pub start: Option<u64>,

    /// Last frame to score. Defaults to the last frame of the dataset.
    #[arg(short, long, value_name = "INT")]
    pub end: Option<u64>,

    /// A frame is a hit when its score is greater than this value.
    #[arg(short, long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Directory for the scoring configuration and per-worker results.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of parallel workers.
    #[arg(short, long, value_name = "INT")]
    pub nproc: Option<usize>,

    /// Path to a run configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Give up on workers that have not finished after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fail a worker on the first frame it cannot read or score, instead of skipping it.
    #[arg(long)]
    pub abort_on_scoring_error: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S spot-detection.spot-level=4
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `config` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the dataset's master metadata file (master.toml).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub master: PathBuf,

    /// Where to write the scoring configuration.
    #[arg(short, long, value_name = "PATH", default_value = "sxhit.dat")]
    pub output: PathBuf,

    /// Path to a run configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
