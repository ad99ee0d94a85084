//! Slideshow videos built from synced photos.
//!
//! [`create_slideshow`] resolves selected thumbnails back to their
//! originals, stages them as JPEG/PNG in a temp directory, and drives
//! ffmpeg's concat demuxer. A `.<name>.created` marker is written next to
//! the finished video so thumbnail passes leave it alone.

mod encode;
mod process;
mod resolve;
mod stage;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub use encode::{concat_list, ffmpeg_args, pick_random, select_music};
pub use resolve::{original_for, resolve_originals};
pub use stage::stage_photos;

/// Default seconds each photo stays on screen.
pub const DEFAULT_FRAME_DURATION: f64 = 3.0;

/// Limit for one ffmpeg encode.
pub const ENCODE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Fade-in and fade-out length in seconds.
pub const FADE_SECS: f64 = 0.5;

/// Errors produced while building a slideshow.
#[derive(Debug, thiserror::Error)]
pub enum SlideshowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid video name: {0:?}")]
    InvalidName(String),

    #[error("invalid quality {0:?} (expected high, medium or low)")]
    InvalidQuality(String),

    #[error("no original photos found for the selection")]
    NoPhotos,

    #[error("no photos left after conversion")]
    NothingStaged,

    #[error("tool not found: {0}")]
    ToolMissing(String),

    #[error("{tool} exited with {status}: {output}")]
    ToolFailed {
        tool: String,
        status: String,
        output: String,
    },

    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    ToolTimeout { tool: String, timeout: Duration },
}

/// Output resolution preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quality {
    High,
    #[default]
    Medium,
    Low,
}

impl Quality {
    /// ffmpeg `W:H` for the preset.
    pub fn scale(self) -> &'static str {
        match self {
            Self::High => "1920:1080",
            Self::Medium => "1280:720",
            Self::Low => "854:480",
        }
    }
}

impl FromStr for Quality {
    type Err = SlideshowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(SlideshowError::InvalidQuality(s.to_string())),
        }
    }
}

/// What to build.
#[derive(Debug, Clone)]
pub struct SlideshowRequest {
    /// Output basename; the video is `<name>.mp4`.
    pub name: String,
    /// Selected thumbnail filenames, in display order.
    pub thumbnails: Vec<String>,
    /// Seconds per photo.
    pub frame_duration: f64,
    pub quality: Quality,
    /// Preferred file under the music directory.
    pub music: Option<String>,
}

/// Host tools and locations.
#[derive(Debug, Clone)]
pub struct SlideshowSettings {
    pub ffmpeg: PathBuf,
    pub heif_convert: PathBuf,
    pub music_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for SlideshowSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            heif_convert: PathBuf::from("heif-convert"),
            music_dir: PathBuf::from("/data/music"),
            timeout: ENCODE_TIMEOUT,
        }
    }
}

/// Plain file name: non-empty, no separators, not `.`/`..`.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Builds `<phone_dir>/<name>.mp4` and its creation marker.
pub async fn create_slideshow(
    phone_dir: &Path,
    request: &SlideshowRequest,
    settings: &SlideshowSettings,
) -> Result<PathBuf, SlideshowError> {
    if !is_plain_name(&request.name) || request.name.starts_with('.') {
        return Err(SlideshowError::InvalidName(request.name.clone()));
    }

    let originals = resolve_originals(phone_dir, &request.thumbnails).await;
    if originals.is_empty() {
        return Err(SlideshowError::NoPhotos);
    }

    let staging = tempfile::Builder::new().prefix("slideshow-").tempdir()?;
    let staged = stage_photos(&originals, staging.path(), &settings.heif_convert).await;
    if staged.is_empty() {
        return Err(SlideshowError::NothingStaged);
    }

    let concat = staging.path().join("concat.txt");
    tokio::fs::write(&concat, concat_list(&staged, request.frame_duration)).await?;

    let music = select_music(&settings.music_dir, request.music.as_deref()).await;
    let output = phone_dir.join(format!("{}.mp4", request.name));
    let args = ffmpeg_args(
        &concat,
        music.as_deref(),
        request.quality,
        request.frame_duration,
        staged.len(),
        &output,
    );

    tracing::info!(
        output = %output.display(),
        photos = staged.len(),
        music = ?music,
        quality = request.quality.scale(),
        "encoding slideshow"
    );
    let mut cmd = tokio::process::Command::new(&settings.ffmpeg);
    cmd.args(&args);
    process::run(cmd, settings.timeout).await?;

    let marker = photosync_media::created_marker_path(&output);
    if let Err(e) = tokio::fs::write(&marker, photosync_media::CREATED_MARKER_CONTENT).await {
        tracing::warn!(marker = %marker.display(), "failed to write created marker: {e}");
    }

    tracing::info!(output = %output.display(), "slideshow created");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_presets() {
        assert_eq!("high".parse::<Quality>().unwrap().scale(), "1920:1080");
        assert_eq!("Medium".parse::<Quality>().unwrap().scale(), "1280:720");
        assert_eq!(" low ".parse::<Quality>().unwrap().scale(), "854:480");
        assert_eq!(Quality::default(), Quality::Medium);
        assert!(matches!(
            "ultra".parse::<Quality>(),
            Err(SlideshowError::InvalidQuality(q)) if q == "ultra"
        ));
    }

    #[test]
    fn plain_names() {
        assert!(is_plain_name("summer"));
        assert!(is_plain_name("trip 2024"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
    }

    fn request(name: &str, thumbnails: &[&str]) -> SlideshowRequest {
        SlideshowRequest {
            name: name.into(),
            thumbnails: thumbnails.iter().map(|t| t.to_string()).collect(),
            frame_duration: 2.0,
            quality: Quality::Low,
            music: None,
        }
    }

    #[tokio::test]
    async fn rejects_bad_name_and_empty_selection() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SlideshowSettings::default();

        let result = create_slideshow(dir.path(), &request("../x", &["tbn-a.jpg"]), &settings).await;
        assert!(matches!(result, Err(SlideshowError::InvalidName(_))));

        let result = create_slideshow(dir.path(), &request("show", &["tbn-a.jpg"]), &settings).await;
        assert!(matches!(result, Err(SlideshowError::NoPhotos)));
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &std::path::Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn writes_video_and_marker() {
        let phone = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        std::fs::write(phone.path().join("a.jpg"), b"\xFF\xD8\xFFa").unwrap();
        std::fs::write(phone.path().join("b.png"), b"\x89PNGb").unwrap();

        let settings = SlideshowSettings {
            // Writes its last argument, the output path.
            ffmpeg: fake_ffmpeg(tools.path(), r#"for last; do :; done; echo video > "$last""#),
            music_dir: tools.path().join("no-music"),
            ..SlideshowSettings::default()
        };
        let output = create_slideshow(
            phone.path(),
            &request("summer", &["tbn-a.jpg", "tbn-b.png", "tbn-gone.jpg"]),
            &settings,
        )
        .await
        .unwrap();

        assert_eq!(output, phone.path().join("summer.mp4"));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "video\n");
        let marker = phone.path().join(".summer.created");
        assert_eq!(std::fs::read_to_string(marker).unwrap(), "created");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn encoder_failure_leaves_no_marker() {
        let phone = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        std::fs::write(phone.path().join("a.jpg"), b"\xFF\xD8\xFFa").unwrap();

        let settings = SlideshowSettings {
            ffmpeg: fake_ffmpeg(tools.path(), "echo 'Invalid data' >&2; exit 1"),
            music_dir: tools.path().join("no-music"),
            ..SlideshowSettings::default()
        };
        let result = create_slideshow(phone.path(), &request("x", &["tbn-a.jpg"]), &settings).await;
        match result {
            Err(SlideshowError::ToolFailed { output, .. }) => assert!(output.contains("Invalid data")),
            other => panic!("expected ffmpeg failure, got {other:?}"),
        }
        assert!(!phone.path().join(".x.created").exists());
    }
}
