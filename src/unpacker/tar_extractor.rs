use crate::error::{Result, UnpackError};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Runs the external `tar` program: `tar -xf <archive> -C <destination>`.
#[derive(Debug, Clone)]
pub struct TarExtractor {
    program: String,
    timeout: Option<Duration>,
}

impl TarExtractor {
    pub fn new() -> Self {
        Self {
            program: "tar".to_string(),
            timeout: None,
        }
    }

    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Extract `archive` into `destination`, waiting for the tool to exit.
    ///
    /// The destination is not created or checked here; the caller owns that.
    /// On timeout the child is killed and whatever it wrote stays on disk.
    pub async fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("-xf")
            .arg(archive)
            .arg("-C")
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => UnpackError::ToolNotFound {
                program: self.program.clone(),
            },
            _ => UnpackError::Io(e),
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| UnpackError::Timeout {
                    archive: archive.display().to_string(),
                    limit,
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(UnpackError::ExtractionFailed {
                archive: archive.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    pub fn command_line(&self, archive: &Path, destination: &Path) -> String {
        format!(
            "{} -xf {} -C {}",
            self.program,
            archive.display(),
            destination.display()
        )
    }
}

impl Default for TarExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpacker::test_support::{fake_tool, write_tar};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extracts_into_destination() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("n01440764.tar");
        write_tar(&archive, &[("img_1.JPEG", b"first"), ("img_2.JPEG", b"other")]);

        let destination = temp_dir.path().join("n01440764");
        fs::create_dir(&destination).unwrap();

        TarExtractor::new()
            .extract(&archive, &destination)
            .await
            .unwrap();

        assert_eq!(fs::read(destination.join("img_1.JPEG")).unwrap(), b"first");
        assert_eq!(fs::read(destination.join("img_2.JPEG")).unwrap(), b"other");
        assert!(archive.exists());
    }

    #[tokio::test]
    async fn test_non_archive_fails_with_exit_status() {
        let temp_dir = TempDir::new().unwrap();
        let not_an_archive = temp_dir.path().join("image.JPEG");
        fs::write(&not_an_archive, b"definitely not a tar file, just some bytes").unwrap();

        let destination = temp_dir.path().join("image");
        fs::create_dir(&destination).unwrap();

        let result = TarExtractor::new()
            .extract(&not_an_archive, &destination)
            .await;

        match result {
            Err(UnpackError::ExtractionFailed { archive, code, .. }) => {
                assert!(archive.ends_with("image.JPEG"));
                assert_ne!(code, Some(0));
            }
            other => panic!("expected extraction failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_archive_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = TarExtractor::new()
            .extract(&temp_dir.path().join("missing.tar"), temp_dir.path())
            .await;

        assert!(matches!(result, Err(UnpackError::ExtractionFailed { .. })));
    }

    #[tokio::test]
    async fn test_missing_program_reported() {
        let temp_dir = TempDir::new().unwrap();
        let result = TarExtractor::new()
            .with_program("definitely-not-an-installed-tar")
            .extract(&temp_dir.path().join("a.tar"), temp_dir.path())
            .await;

        match result {
            Err(UnpackError::ToolNotFound { program }) => {
                assert_eq!(program, "definitely-not-an-installed-tar");
            }
            other => panic!("expected missing tool, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stuck_tool_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(temp_dir.path(), "slow-tar", "exec sleep 5");

        let started = std::time::Instant::now();
        let result = TarExtractor::new()
            .with_program(tool.display().to_string())
            .with_timeout(Some(Duration::from_millis(200)))
            .extract(&temp_dir.path().join("train.tar"), temp_dir.path())
            .await;

        match result {
            Err(UnpackError::Timeout { archive, limit }) => {
                assert!(archive.ends_with("train.tar"));
                assert_eq!(limit, Duration::from_millis(200));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_command_line() {
        let extractor = TarExtractor::new().with_program("gtar");
        assert_eq!(
            extractor.command_line(Path::new("train.tar"), Path::new("train")),
            "gtar -xf train.tar -C train"
        );
    }
}
