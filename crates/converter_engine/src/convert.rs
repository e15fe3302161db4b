use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use engine_logging::engine_debug;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("converter could not be started: {0}")]
    Spawn(std::io::Error),
    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("converter timed out after {0:?}")]
    Timeout(Duration),
    #[error("expected output missing at {0}")]
    MissingOutput(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a fetched document into its publishable form.
///
/// Each pool worker owns its own instance, so implementations may keep
/// per-instance state without synchronisation.
#[async_trait::async_trait]
pub trait ConversionService: Send {
    /// Converts `input`, writing the result into `output_dir`.
    async fn transform(&mut self, input: &Path, output_dir: &Path)
        -> Result<PathBuf, ConversionError>;

    /// Identity conversion for documents already in the target format.
    async fn pass_through(&mut self, input: &Path) -> Result<PathBuf, ConversionError> {
        let meta = tokio::fs::metadata(input).await?;
        if !meta.is_file() {
            return Err(ConversionError::MissingOutput(input.to_path_buf()));
        }
        Ok(input.to_path_buf())
    }
}

#[async_trait::async_trait]
impl<T: ConversionService + ?Sized> ConversionService for Box<T> {
    async fn transform(
        &mut self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        (**self).transform(input, output_dir).await
    }

    async fn pass_through(&mut self, input: &Path) -> Result<PathBuf, ConversionError> {
        (**self).pass_through(input).await
    }
}

/// Converts through an office suite in headless mode
/// (`soffice --headless --convert-to pdf --outdir <dir> <file>`).
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    timeout: Duration,
    /// Private profile directory; concurrent instances must not share one.
    profile_dir: Option<PathBuf>,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            profile_dir: None,
        }
    }

    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    fn command(&self, input: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless");
        if let Some(profile) = self
            .profile_dir
            .as_deref()
            .and_then(|dir| url::Url::from_directory_path(dir).ok())
        {
            cmd.arg(format!("-env:UserInstallation={profile}"));
        }
        cmd.arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(output_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl ConversionService for CommandConverter {
    async fn transform(
        &mut self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        let stem = input
            .file_stem()
            .map(|s| s.to_os_string())
            .ok_or_else(|| ConversionError::MissingOutput(input.to_path_buf()))?;
        let mut expected = output_dir.join(stem);
        expected.set_extension("pdf");

        tokio::fs::create_dir_all(output_dir).await?;
        let child = self
            .command(input, output_dir)
            .spawn()
            .map_err(ConversionError::Spawn)?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ConversionError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ConversionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Err(ConversionError::MissingOutput(expected));
        }
        engine_debug!("Converted {} -> {}", input.display(), expected.display());
        Ok(expected)
    }
}
