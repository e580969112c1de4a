use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("Malformed archive name '{name}': {reason}")]
    NameFormat { name: String, reason: String },

    #[error("Directory already exists: {path}")]
    DirectoryExists { path: String },

    #[error("Extraction of {archive} failed ({})", describe_exit(.code))]
    ExtractionFailed {
        archive: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Extraction tool not found: {program}")]
    ToolNotFound { program: String },

    #[error("Extraction of {archive} timed out after {limit:?}")]
    Timeout { archive: String, limit: Duration },

    #[error("Failed to {operation} {}: {source}", .path.display())]
    FileSystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

impl UnpackError {
    pub fn name_format<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        UnpackError::NameFormat {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn file_system<P: Into<PathBuf>>(
        operation: &'static str,
        path: P,
        source: std::io::Error,
    ) -> Self {
        UnpackError::FileSystem {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Cancellation always stops the run, whatever the error policy.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, UnpackError::Cancelled)
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for UnpackError {
    fn user_message(&self) -> String {
        match self {
            UnpackError::NameFormat { name, reason } => {
                format!("Cannot derive a directory name from '{}': {}", name, reason)
            }
            UnpackError::DirectoryExists { path } => {
                format!("Output directory already exists: {}", path)
            }
            UnpackError::ExtractionFailed {
                archive,
                code,
                stderr,
            } => {
                if stderr.is_empty() {
                    format!("Extraction of {} failed ({})", archive, describe_exit(code))
                } else {
                    format!(
                        "Extraction of {} failed ({}): {}",
                        archive,
                        describe_exit(code),
                        stderr
                    )
                }
            }
            UnpackError::ToolNotFound { program } => {
                format!("Could not run extraction tool '{}'", program)
            }
            UnpackError::Timeout { archive, limit } => {
                format!("Extraction of {} timed out after {:?}", archive, limit)
            }
            UnpackError::FileSystem {
                operation,
                path,
                source,
            } => {
                format!("Failed to {} {}: {}", operation, path.display(), source)
            }
            UnpackError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            UnpackError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            UnpackError::NameFormat { .. } => Some(
                "Archive and class names must look like <name>.tar with exactly one dot and no path separators.".to_string()
            ),
            UnpackError::DirectoryExists { .. } => Some(
                "Unpacking is not idempotent. Remove the existing directory or run from a clean working directory.".to_string()
            ),
            UnpackError::ExtractionFailed { .. } => Some(
                "Check that the archive exists and is a valid tar file. Use --nested matching-splits to skip splits that do not contain nested archives.".to_string()
            ),
            UnpackError::ToolNotFound { .. } => Some(
                "Install tar or point --tar at the extraction program to use.".to_string()
            ),
            UnpackError::Timeout { .. } => Some(
                "Increase the extraction timeout with --timeout, or use 0 to disable it.".to_string()
            ),
            UnpackError::FileSystem { .. } => Some(
                "Ensure you have the necessary read/write permissions for the base directory.".to_string()
            ),
            UnpackError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for UnpackError {
    fn from(error: toml::de::Error) -> Self {
        UnpackError::Config {
            message: error.to_string(),
        }
    }
}

impl From<regex::Error> for UnpackError {
    fn from(error: regex::Error) -> Self {
        UnpackError::Config {
            message: format!("Invalid split pattern: {}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, UnpackError>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
