use crate::config::{CliOverrides, Config, ErrorPolicy, NestedMode};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imagenet-unpack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Unpack ImageNet-style tar archives into a directory-per-class layout")]
#[command(
    long_about = "imagenet-unpack extracts each top-level dataset archive into a directory named \
                  after it, then unpacks the per-class archives inside training splits into one \
                  directory per class label, deleting each class archive once it is extracted."
)]
#[command(after_help = "EXAMPLES:\n  \
    imagenet-unpack\n  \
    imagenet-unpack ILSVRC2012_img_train.tar ILSVRC2012_img_val.tar\n  \
    imagenet-unpack --directory /data/imagenet --on-error continue -v\n  \
    imagenet-unpack --nested all --keep-nested --dry-run")]
pub struct Cli {
    /// Top-level archives to unpack (defaults to the configured list)
    pub archives: Vec<String>,

    /// Directory containing the archives; output directories are created here
    #[arg(short = 'C', long = "directory")]
    pub directory: Option<PathBuf>,

    /// Which top-level archives contain per-class archives
    #[arg(long, value_enum)]
    pub nested: Option<NestedMode>,

    /// Regex selecting nested-archive splits by archive file name
    #[arg(long, help = "Pattern matched against archive names (default: train)")]
    pub split_pattern: Option<String>,

    /// What to do when an archive or class fails to unpack
    #[arg(long, value_enum)]
    pub on_error: Option<ErrorPolicy>,

    /// Keep per-class archives after extracting them
    #[arg(long)]
    pub keep_nested: bool,

    /// Extraction program
    #[arg(long = "tar", value_name = "PROGRAM", env = "IMAGENET_UNPACK_TAR")]
    pub tar_program: Option<String>,

    /// Per-extraction timeout in seconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are printed)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show what would be unpacked without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a sample configuration file
    #[arg(long)]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config =
            Config::load_with_defaults(self.config.as_ref(), self.directory.as_deref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let archives = if self.archives.is_empty() {
            None
        } else {
            Some(self.archives.clone())
        };

        CliOverrides::new()
            .with_archives(archives)
            .with_base_directory(self.directory.clone())
            .with_nested(self.nested)
            .with_split_pattern(self.split_pattern.clone())
            .with_on_error(self.on_error)
            .with_keep_nested(self.keep_nested)
            .with_tar_program(self.tar_program.clone())
            .with_timeout(self.timeout)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
