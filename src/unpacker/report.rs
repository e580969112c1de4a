use crate::config::ErrorPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Progress notifications emitted by the unpacker as it works.
#[derive(Debug, Clone)]
pub enum UnpackEvent {
    ArchiveStarted {
        archive: String,
        archive_path: PathBuf,
        output_dir: PathBuf,
    },
    TopLevelExtracted {
        archive: String,
        entries: usize,
        nested: bool,
    },
    NestedStarted {
        entry: String,
        index: usize,
        total: usize,
    },
    NestedFinished {
        entry: String,
        label: String,
    },
    NestedFailed {
        entry: String,
        error: String,
    },
    ArchiveFinished {
        outcome: ArchiveOutcome,
    },
    ArchiveFailed {
        archive: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryFailure {
    pub entry: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    pub archive: String,
    pub output_dir: PathBuf,
    pub top_level_entries: usize,
    pub nested_processed: bool,
    pub classes: Vec<String>,
    pub failures: Vec<EntryFailure>,
    pub error: Option<String>,
    pub disk_usage: DiskUsage,
}

impl ArchiveOutcome {
    pub fn new<S: Into<String>>(archive: S, output_dir: PathBuf) -> Self {
        Self {
            archive: archive.into(),
            output_dir,
            top_level_entries: 0,
            nested_processed: false,
            classes: Vec::new(),
            failures: Vec::new(),
            error: None,
            disk_usage: DiskUsage::default(),
        }
    }

    pub fn failed<S: Into<String>>(archive: S, output_dir: PathBuf, error: String) -> Self {
        let mut outcome = Self::new(archive, output_dir);
        outcome.error = Some(error);
        outcome
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub files: u64,
    pub bytes: u64,
}

impl DiskUsage {
    /// Count regular files below `root`. Unreadable entries are skipped.
    pub fn collect(root: &Path) -> Self {
        let mut usage = DiskUsage::default();

        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                usage.files += 1;
                usage.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        usage
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpackReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub base_directory: PathBuf,
    pub archives: Vec<ArchiveOutcome>,
    pub errors: Vec<String>,
}

impl UnpackReport {
    pub fn new(base_directory: PathBuf) -> Self {
        Self {
            started_at: Utc::now(),
            duration: Duration::ZERO,
            base_directory,
            archives: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ArchiveOutcome) {
        if let Some(ref error) = outcome.error {
            self.errors.push(format!("{}: {}", outcome.archive, error));
        }
        for failure in &outcome.failures {
            self.errors.push(format!(
                "{}/{}: {}",
                outcome.archive, failure.entry, failure.error
            ));
        }
        self.archives.push(outcome);
    }

    pub fn total_classes(&self) -> usize {
        self.archives.iter().map(|a| a.classes.len()).sum()
    }

    pub fn total_usage(&self) -> DiskUsage {
        self.archives
            .iter()
            .fold(DiskUsage::default(), |acc, archive| DiskUsage {
                files: acc.files + archive.disk_usage.files,
                bytes: acc.bytes + archive.disk_usage.bytes,
            })
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What a dry run would do for one top-level archive.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedArchive {
    pub archive: String,
    pub output_dir: Option<PathBuf>,
    pub nested: bool,
    pub command: Option<String>,
    pub archive_found: bool,
    /// Why the archive would fail before extraction, if it would.
    pub problem: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnpackPlan {
    pub base_directory: PathBuf,
    pub nested_archives: String,
    pub on_error: ErrorPolicy,
    pub delete_nested: bool,
    pub archives: Vec<PlannedArchive>,
}

impl UnpackPlan {
    pub fn is_viable(&self) -> bool {
        self.archives.iter().all(|archive| archive.problem.is_none())
    }
}
