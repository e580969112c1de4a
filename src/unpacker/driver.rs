use crate::config::{Config, ErrorPolicy};
use crate::error::{Result, UnpackError};
use crate::unpacker::archive_name::{ArchiveName, SplitSelector};
use crate::unpacker::report::{
    ArchiveOutcome, DiskUsage, EntryFailure, PlannedArchive, UnpackEvent, UnpackPlan, UnpackReport,
};
use crate::unpacker::tar_extractor::TarExtractor;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type EventCallback<'a> = &'a dyn Fn(&UnpackEvent);

/// Unpacks top-level dataset archives, then the per-class archives inside them.
///
/// Work is strictly sequential. Every step mutates the filesystem and nothing
/// is rolled back when a later step fails.
pub struct ArchiveUnpacker {
    base_dir: PathBuf,
    extractor: TarExtractor,
    selector: SplitSelector,
    on_error: ErrorPolicy,
    delete_nested: bool,
    running: Arc<AtomicBool>,
}

impl ArchiveUnpacker {
    pub fn new<P: Into<PathBuf>>(base_dir: P, selector: SplitSelector) -> Self {
        Self {
            base_dir: base_dir.into(),
            extractor: TarExtractor::new(),
            selector,
            on_error: ErrorPolicy::Abort,
            delete_nested: true,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let selector = SplitSelector::new(config.unpack.nested, &config.unpack.split_pattern)?;
        let extractor = TarExtractor::new()
            .with_program(config.tar.program.clone())
            .with_timeout(config.tar_timeout_duration());

        Ok(Self::new(config.archives.base_directory.clone(), selector)
            .with_extractor(extractor)
            .with_error_policy(config.unpack.on_error)
            .with_delete_nested(config.unpack.delete_nested))
    }

    pub fn with_extractor(mut self, extractor: TarExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    pub fn with_delete_nested(mut self, delete: bool) -> Self {
        self.delete_nested = delete;
        self
    }

    /// Share a running flag; clearing it cancels the run at the next step boundary.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn extractor(&self) -> &TarExtractor {
        &self.extractor
    }

    pub fn selector(&self) -> &SplitSelector {
        &self.selector
    }

    pub async fn run(
        &self,
        archives: &[String],
        callback: Option<EventCallback<'_>>,
    ) -> Result<UnpackReport> {
        let start = Instant::now();
        let mut report = UnpackReport::new(self.base_dir.clone());

        for raw_name in archives {
            self.check_cancelled()?;

            match self.unpack_archive(raw_name, callback).await {
                Ok(outcome) => {
                    emit(callback, UnpackEvent::ArchiveFinished {
                        outcome: outcome.clone(),
                    });
                    report.record(outcome);
                }
                Err(e) if self.should_continue(&e) => {
                    emit(callback, UnpackEvent::ArchiveFailed {
                        archive: raw_name.clone(),
                        error: e.to_string(),
                    });
                    let output_dir = self.output_dir_for(raw_name);
                    report.record(ArchiveOutcome::failed(
                        raw_name.as_str(),
                        output_dir,
                        e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    /// Describe what `run` would do with `archives` without touching disk.
    pub fn plan(&self, archives: &[String]) -> UnpackPlan {
        let planned = archives
            .iter()
            .map(|raw_name| match ArchiveName::parse(raw_name) {
                Ok(name) => {
                    let archive_path = self.base_dir.join(name.file_name());
                    let output_dir = self.base_dir.join(name.identifier());
                    let problem = if output_dir.exists() {
                        Some(format!("Output directory already exists: {}", output_dir.display()))
                    } else {
                        None
                    };

                    PlannedArchive {
                        archive: name.to_string(),
                        nested: self.selector.bears_nested_archives(&name),
                        command: Some(self.extractor.command_line(&archive_path, &output_dir)),
                        archive_found: archive_path.is_file(),
                        output_dir: Some(output_dir),
                        problem,
                    }
                }
                Err(e) => PlannedArchive {
                    archive: raw_name.clone(),
                    output_dir: None,
                    nested: false,
                    command: None,
                    archive_found: false,
                    problem: Some(e.to_string()),
                },
            })
            .collect();

        UnpackPlan {
            base_directory: self.base_dir.clone(),
            nested_archives: self.selector.describe(),
            on_error: self.on_error,
            delete_nested: self.delete_nested,
            archives: planned,
        }
    }

    /// Create `<base>/<identifier>`, extract the archive there and, for
    /// selected splits, unpack every child as a per-class archive.
    pub async fn unpack_archive(
        &self,
        raw_name: &str,
        callback: Option<EventCallback<'_>>,
    ) -> Result<ArchiveOutcome> {
        let name = ArchiveName::parse(raw_name)?;
        let output_dir = self.base_dir.join(name.identifier());

        let archive_path = self.base_dir.join(name.file_name());

        emit(callback, UnpackEvent::ArchiveStarted {
            archive: name.to_string(),
            archive_path: archive_path.clone(),
            output_dir: output_dir.clone(),
        });

        create_directory(&output_dir)?;
        self.extract(&archive_path, &output_dir).await?;

        let entries = list_entries(&output_dir)?;
        let nested = self.selector.bears_nested_archives(&name);

        let mut outcome = ArchiveOutcome::new(name.to_string(), output_dir.clone());
        outcome.top_level_entries = entries.len();
        outcome.nested_processed = nested;

        emit(callback, UnpackEvent::TopLevelExtracted {
            archive: name.to_string(),
            entries: entries.len(),
            nested,
        });

        if nested {
            let total = entries.len();
            for (index, entry) in entries.iter().enumerate() {
                self.check_cancelled()?;

                let entry_name = entry.to_string_lossy().to_string();
                emit(callback, UnpackEvent::NestedStarted {
                    entry: entry_name.clone(),
                    index,
                    total,
                });

                match self.unpack_nested(&output_dir, entry).await {
                    Ok(label) => {
                        emit(callback, UnpackEvent::NestedFinished {
                            entry: entry_name,
                            label: label.clone(),
                        });
                        outcome.classes.push(label);
                    }
                    Err(e) if self.should_continue(&e) => {
                        emit(callback, UnpackEvent::NestedFailed {
                            entry: entry_name.clone(),
                            error: e.to_string(),
                        });
                        outcome.failures.push(EntryFailure {
                            entry: entry_name,
                            error: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        outcome.disk_usage = DiskUsage::collect(&output_dir);
        Ok(outcome)
    }

    async fn unpack_nested(&self, dataset_dir: &Path, entry: &OsString) -> Result<String> {
        let label = ArchiveName::from_os_str(entry)?;
        let class_dir = dataset_dir.join(label.identifier());
        let nested_archive = dataset_dir.join(entry);

        create_directory(&class_dir)?;
        self.extract(&nested_archive, &class_dir).await?;

        if self.delete_nested {
            fs::remove_file(&nested_archive)
                .map_err(|e| UnpackError::file_system("remove", &nested_archive, e))?;
        }

        Ok(label.identifier().to_string())
    }

    /// Ctrl+C reaches the `tar` child too, so a failure seen after the
    /// running flag was cleared is reported as cancellation.
    async fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        match self.extractor.extract(archive, destination).await {
            Err(_) if !self.running.load(Ordering::SeqCst) => Err(UnpackError::Cancelled),
            result => result,
        }
    }

    fn should_continue(&self, error: &UnpackError) -> bool {
        self.on_error == ErrorPolicy::Continue && !error.is_cancellation()
    }

    fn check_cancelled(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(UnpackError::Cancelled);
        }
        Ok(())
    }

    fn output_dir_for(&self, raw_name: &str) -> PathBuf {
        match ArchiveName::parse(raw_name) {
            Ok(name) => self.base_dir.join(name.identifier()),
            Err(_) => self.base_dir.clone(),
        }
    }
}

fn emit(callback: Option<EventCallback<'_>>, event: UnpackEvent) {
    if let Some(callback) = callback {
        callback(&event);
    }
}

/// Create exactly one directory level; an existing path is an error.
fn create_directory(path: &Path) -> Result<()> {
    fs::create_dir(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => UnpackError::DirectoryExists {
            path: path.display().to_string(),
        },
        _ => UnpackError::file_system("create", path, e),
    })
}

/// Immediate children of `dir`, sorted by name.
fn list_entries(dir: &Path) -> Result<Vec<OsString>> {
    let read_dir = fs::read_dir(dir).map_err(|e| UnpackError::file_system("list", dir, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| UnpackError::file_system("list", dir, e))?;
        entries.push(entry.file_name());
    }
    entries.sort();

    Ok(entries)
}
