pub mod cli;
pub mod config;
pub mod error;
pub mod ui;
pub mod unpacker;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{
    ArchivesConfig, CliOverrides, Config, ErrorPolicy, NestedMode, TarConfig, UnpackConfig,
};
pub use error::{Result, UnpackError, UserFriendlyError};

// Core functionality re-exports
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};
pub use unpacker::{
    ArchiveName, ArchiveOutcome, ArchiveUnpacker, EventCallback, SplitSelector, TarExtractor,
    UnpackEvent, UnpackPlan, UnpackReport,
};

use indicatif::ProgressBar;
use std::cell::RefCell;
use std::path::Path;
use std::time::Instant;

/// Main library interface: configuration plus terminal wiring around an
/// [`ArchiveUnpacker`].
pub struct ImagenetUnpack {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl ImagenetUnpack {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// Create an instance for testing (no signal handler registration)
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Self::new(config, output_mode, cli_args.verbosity_level(), cli_args.quiet)
    }

    /// Unpack every configured archive.
    pub async fn unpack(&self) -> Result<UnpackReport> {
        self.shutdown.check_shutdown()?;

        let unpacker =
            ArchiveUnpacker::from_config(&self.config)?.with_running_flag(self.shutdown.running_flag());

        self.output_formatter.start_operation(&format!(
            "Unpacking {} archive(s) in {}",
            self.config.archives.names.len(),
            unpacker.base_dir().display()
        ));
        self.output_formatter.debug(&format!(
            "Nested archives are unpacked for {}",
            unpacker.selector().describe()
        ));

        let reporter = EventReporter::new(self, unpacker.extractor());
        let handle_event = |event: &UnpackEvent| reporter.handle(event);
        let callback: EventCallback<'_> = &handle_event;

        let report = unpacker
            .run(&self.config.archives.names, Some(callback))
            .await;
        reporter.abandon();
        self.progress_manager.clear();

        report
    }

    /// Print the plan for the configured archives without touching disk.
    /// Returns `false` when some archive would fail before extraction.
    pub fn print_plan(&self) -> Result<bool> {
        let unpacker = ArchiveUnpacker::from_config(&self.config)?;
        let plan = unpacker.plan(&self.config.archives.names);
        self.output_formatter.print_unpack_plan(&plan);

        Ok(plan.is_viable())
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config).map_err(UnpackError::Io)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &UnpackError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Turns unpacker events into messages and progress bars.
struct EventReporter<'a> {
    app: &'a ImagenetUnpack,
    extractor: &'a TarExtractor,
    spinner: RefCell<Option<ProgressBar>>,
    classes: RefCell<Option<(ProgressBar, Instant)>>,
}

impl<'a> EventReporter<'a> {
    fn new(app: &'a ImagenetUnpack, extractor: &'a TarExtractor) -> Self {
        Self {
            app,
            extractor,
            spinner: RefCell::new(None),
            classes: RefCell::new(None),
        }
    }

    fn handle(&self, event: &UnpackEvent) {
        let formatter = &self.app.output_formatter;
        let progress = &self.app.progress_manager;

        match event {
            UnpackEvent::ArchiveStarted {
                archive,
                archive_path,
                output_dir,
            } => {
                progress.suspend(|| {
                    formatter.start_operation(&format!("Unpacking toplevel tar {}", archive));
                    formatter.debug(&self.extractor.command_line(archive_path, output_dir));
                });
                *self.spinner.borrow_mut() =
                    Some(progress.create_spinner(&format!("Extracting {}", archive)));
            }
            UnpackEvent::TopLevelExtracted {
                archive,
                entries,
                nested,
            } => {
                if let Some(spinner) = self.spinner.borrow_mut().take() {
                    spinner.finish_and_clear();
                }
                progress.suspend(|| {
                    formatter.info(&format!("Extracted {} ({} entries)", archive, entries));
                    if !nested {
                        formatter.info(&format!(
                            "{} is not a nested-archive split; leaving its contents as extracted",
                            archive
                        ));
                    }
                });
                if *nested {
                    *self.classes.borrow_mut() = Some((
                        progress.create_class_progress(*entries as u64),
                        Instant::now(),
                    ));
                }
            }
            UnpackEvent::NestedStarted { entry, index, .. } => {
                if let Some((ref pb, _)) = *self.classes.borrow() {
                    ui::progress::update_class_progress(pb, entry, *index);
                }
                progress.suspend(|| formatter.debug(&format!("Unpacking file {}", entry)));
            }
            UnpackEvent::NestedFinished { .. } => {
                if let Some((ref pb, _)) = *self.classes.borrow() {
                    pb.inc(1);
                }
            }
            UnpackEvent::NestedFailed { entry, error } => {
                if let Some((ref pb, _)) = *self.classes.borrow() {
                    pb.inc(1);
                }
                progress.suspend(|| formatter.warning(&format!("{}: {}", entry, error)));
            }
            UnpackEvent::ArchiveFinished { outcome } => {
                if let Some((pb, started)) = self.classes.borrow_mut().take() {
                    ui::progress::finish_progress_with_summary(
                        &pb,
                        &format!("Unpacked {} classes", outcome.classes.len()),
                        started.elapsed(),
                    );
                }
                progress.suspend(|| {
                    formatter.success(&format!(
                        "{} unpacked into {}",
                        outcome.archive,
                        outcome.output_dir.display()
                    ))
                });
            }
            UnpackEvent::ArchiveFailed { archive, error } => {
                self.abandon();
                progress.suspend(|| formatter.error(&format!("{}: {}", archive, error)));
            }
        }
    }

    /// Drop any bars left over from an archive that did not finish.
    fn abandon(&self) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.abandon();
        }
        if let Some((pb, _)) = self.classes.borrow_mut().take() {
            pb.abandon();
        }
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpacker::test_support::{tar_bytes, write_tar};
    use tempfile::TempDir;

    fn config_in(base: &Path, names: &[&str]) -> Config {
        let mut config = Config::default();
        config.archives.base_directory = base.to_path_buf();
        config.archives.names = names.iter().map(|s| s.to_string()).collect();
        config
    }

    #[test]
    fn test_instance_creation() {
        let temp_dir = TempDir::new().unwrap();
        let app = ImagenetUnpack::new_for_test(
            config_in(temp_dir.path(), &["ILSVRC2012_img_train.tar"]),
            OutputMode::Plain,
            0,
            true,
        );
        assert!(app.is_running());
        assert!(!app.progress_manager().is_enabled());
        assert_eq!(app.config().archives.names.len(), 1);
    }

    #[tokio::test]
    async fn test_unpack_through_facade() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let class = tar_bytes(&[("img.JPEG", b"pixels")]);
        write_tar(
            &base.join("ILSVRC2012_img_train.tar"),
            &[("n01440764.tar", class.as_slice())],
        );

        let app = ImagenetUnpack::new_for_test(
            config_in(base, &["ILSVRC2012_img_train.tar"]),
            OutputMode::Plain,
            2,
            false,
        );
        let report = app.unpack().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.total_classes(), 1);
        assert!(base
            .join("ILSVRC2012_img_train/n01440764/img.JPEG")
            .is_file());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_unpack() {
        let temp_dir = TempDir::new().unwrap();
        let app = ImagenetUnpack::new_for_test(
            config_in(temp_dir.path(), &["ILSVRC2012_img_train.tar"]),
            OutputMode::Plain,
            0,
            true,
        );

        app.request_shutdown();
        assert!(!app.is_running());
        assert!(matches!(app.unpack().await, Err(UnpackError::Cancelled)));
    }

    #[test]
    fn test_plan_flags_existing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        std::fs::create_dir(base.join("ILSVRC2012_img_train")).unwrap();

        let app = ImagenetUnpack::new_for_test(
            config_in(base, &["ILSVRC2012_img_train.tar"]),
            OutputMode::Plain,
            0,
            true,
        );
        assert!(!app.print_plan().unwrap());

        let fresh = TempDir::new().unwrap();
        let app = ImagenetUnpack::new_for_test(
            config_in(fresh.path(), &["ILSVRC2012_img_val.tar"]),
            OutputMode::Plain,
            0,
            true,
        );
        assert!(app.print_plan().unwrap());
    }

    #[test]
    fn test_plan_flags_malformed_names() {
        let temp_dir = TempDir::new().unwrap();
        let app = ImagenetUnpack::new_for_test(
            config_in(temp_dir.path(), &["ILSVRC2012.img.train.tar"]),
            OutputMode::Plain,
            0,
            true,
        );
        assert!(!app.print_plan().unwrap());
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("imagenet-unpack.toml");

        ImagenetUnpack::generate_sample_config(&config_path).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.archives.names, Config::default().archives.names);
    }

    #[test]
    fn test_version_info() {
        assert!(!version_info().is_empty());
    }
}
