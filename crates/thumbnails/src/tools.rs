//! External codec processes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::{MAX_THUMB_WIDTH, TOOL_TIMEOUT, ThumbnailError};

/// A boxed future returned by tool methods.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ThumbnailError>> + Send + 'a>>;

/// Codec work delegated to external programs.
///
/// Both methods write their result to `dest`; a failure means the source
/// file is skipped for this pass.
pub trait ExternalTools: Send + Sync + 'static {
    /// Transcodes a HEIC/HEIF file to JPEG.
    fn heic_to_jpeg<'a>(&'a self, src: &'a Path, dest: &'a Path) -> ToolFuture<'a>;

    /// Extracts one video frame at `at`, scaled to `width` (aspect kept),
    /// as JPEG.
    fn extract_frame<'a>(
        &'a self,
        src: &'a Path,
        at: Duration,
        width: u32,
        dest: &'a Path,
    ) -> ToolFuture<'a>;
}

/// ffmpeg and ImageMagick from the host.
#[derive(Debug, Clone)]
pub struct SystemTools {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl Default for SystemTools {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl SystemTools {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout: TOOL_TIMEOUT,
        }
    }
}

impl ExternalTools for SystemTools {
    fn heic_to_jpeg<'a>(&'a self, src: &'a Path, dest: &'a Path) -> ToolFuture<'a> {
        Box::pin(async move {
            let mut magick = Command::new("magick");
            magick.arg("convert").arg(src).arg(dest);
            match run(magick, self.timeout).await {
                Err(ThumbnailError::ToolMissing(_)) => {
                    tracing::debug!("magick not found, trying convert");
                    let mut convert = Command::new("convert");
                    convert.arg(src).arg(dest);
                    run(convert, self.timeout).await
                }
                other => other,
            }
        })
    }

    fn extract_frame<'a>(
        &'a self,
        src: &'a Path,
        at: Duration,
        width: u32,
        dest: &'a Path,
    ) -> ToolFuture<'a> {
        Box::pin(async move {
            let width = if width == 0 { MAX_THUMB_WIDTH } else { width };
            let mut cmd = Command::new(&self.ffmpeg);
            cmd.arg("-y")
                .arg("-ss")
                .arg(format!("{:.3}", at.as_secs_f64()))
                .arg("-i")
                .arg(src)
                .args(["-frames:v", "1"])
                .arg("-vf")
                .arg(format!("scale={width}:-1"))
                .arg(dest);
            run(cmd, self.timeout).await
        })
    }
}

/// Runs `cmd` to completion. The child is killed if it outlives `timeout`
/// or if the returned future is dropped.
pub(crate) async fn run(mut cmd: Command, timeout: Duration) -> Result<(), ThumbnailError> {
    let tool = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ThumbnailError::ToolMissing(tool.clone())
        } else {
            ThumbnailError::Io(e)
        }
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(ThumbnailError::ToolTimeout { tool, timeout }),
    };

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(3)..].join(" | ");
    Err(ThumbnailError::ToolFailed {
        tool,
        status: output.status.to_string(),
        stderr: tail,
    })
}
