use crate::error::{Result, UnpackError};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["imagenet-unpack.toml", ".imagenet-unpack.toml"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub archives: ArchivesConfig,
    pub unpack: UnpackConfig,
    pub tar: TarConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchivesConfig {
    pub names: Vec<String>,
    pub base_directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnpackConfig {
    pub nested: NestedMode,
    pub split_pattern: String,
    pub on_error: ErrorPolicy,
    pub delete_nested: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TarConfig {
    pub program: String,
    /// Seconds; 0 disables the limit.
    pub timeout: u64,
}

/// Which top-level archives get their children unpacked as per-class archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NestedMode {
    /// Every top-level archive
    All,
    /// Only archives whose name matches the split pattern
    MatchingSplits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop at the first failure
    Abort,
    /// Record failures and keep going
    Continue,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archives: ArchivesConfig::default(),
            unpack: UnpackConfig::default(),
            tar: TarConfig::default(),
        }
    }
}

impl Default for ArchivesConfig {
    fn default() -> Self {
        Self {
            names: vec![
                "ILSVRC2012_img_train.tar".to_string(),
                "ILSVRC2012_img_test.tar".to_string(),
            ],
            base_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Default for UnpackConfig {
    fn default() -> Self {
        Self {
            nested: NestedMode::MatchingSplits,
            split_pattern: "train".to_string(),
            on_error: ErrorPolicy::Abort,
            delete_nested: true,
        }
    }
}

impl Default for TarConfig {
    fn default() -> Self {
        Self {
            program: "tar".to_string(),
            timeout: 0,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(UnpackError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| UnpackError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| UnpackError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        // A relative base directory is relative to the file that names it.
        if config.archives.base_directory.is_relative() {
            if let Some(parent) = path.parent() {
                config.archives.base_directory = parent.join(&config.archives.base_directory);
            }
        }

        Ok(config)
    }

    /// Load `config_path` if given, otherwise the first default config file
    /// found in `search_dir` (the working directory when `None`).
    pub fn load_with_defaults<P: AsRef<Path>>(
        config_path: Option<P>,
        search_dir: Option<&Path>,
    ) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let search_dir = search_dir.unwrap_or_else(|| Path::new(""));
                for default_name in &DEFAULT_CONFIG_FILES {
                    let default_path = search_dir.join(default_name);
                    if default_path.exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref names) = cli_args.archives {
            self.archives.names = names.clone();
        }

        if let Some(ref base_directory) = cli_args.base_directory {
            self.archives.base_directory = base_directory.clone();
        }

        if let Some(nested) = cli_args.nested {
            self.unpack.nested = nested;
        }

        if let Some(ref pattern) = cli_args.split_pattern {
            self.unpack.split_pattern = pattern.clone();
        }

        if let Some(on_error) = cli_args.on_error {
            self.unpack.on_error = on_error;
        }

        if cli_args.keep_nested {
            self.unpack.delete_nested = false;
        }

        if let Some(ref program) = cli_args.tar_program {
            self.tar.program = program.clone();
        }

        if let Some(timeout) = cli_args.timeout {
            self.tar.timeout = timeout;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| UnpackError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| UnpackError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.archives.names.is_empty() {
            return Err(UnpackError::Config {
                message: "At least one archive name must be specified".to_string(),
            });
        }

        if self.tar.program.trim().is_empty() {
            return Err(UnpackError::Config {
                message: "Extraction program must not be empty".to_string(),
            });
        }

        Regex::new(&self.unpack.split_pattern)?;

        if !self.archives.base_directory.is_dir() {
            return Err(UnpackError::Config {
                message: format!(
                    "Base directory does not exist: {}",
                    self.archives.base_directory.display()
                ),
            });
        }

        Ok(())
    }

    pub fn tar_timeout_duration(&self) -> Option<Duration> {
        match self.tar.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn create_sample_config() -> String {
        let mut sample_config = Self::default();
        sample_config.archives.base_directory = PathBuf::from(".");
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub archives: Option<Vec<String>>,
    pub base_directory: Option<PathBuf>,
    pub nested: Option<NestedMode>,
    pub split_pattern: Option<String>,
    pub on_error: Option<ErrorPolicy>,
    pub keep_nested: bool,
    pub tar_program: Option<String>,
    pub timeout: Option<u64>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archives(mut self, archives: Option<Vec<String>>) -> Self {
        self.archives = archives;
        self
    }

    pub fn with_base_directory(mut self, base_directory: Option<PathBuf>) -> Self {
        self.base_directory = base_directory;
        self
    }

    pub fn with_nested(mut self, nested: Option<NestedMode>) -> Self {
        self.nested = nested;
        self
    }

    pub fn with_split_pattern(mut self, pattern: Option<String>) -> Self {
        self.split_pattern = pattern;
        self
    }

    pub fn with_on_error(mut self, on_error: Option<ErrorPolicy>) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_keep_nested(mut self, keep: bool) -> Self {
        self.keep_nested = keep;
        self
    }

    pub fn with_tar_program(mut self, program: Option<String>) -> Self {
        self.tar_program = program;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }
}
