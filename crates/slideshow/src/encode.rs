//! ffmpeg inputs: concat list, background music and arguments.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{FADE_SECS, Quality, is_plain_name};

fn quote(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Concat demuxer script: every photo with its duration, then the last
/// photo once more so its duration is honored.
pub fn concat_list(photos: &[PathBuf], frame_duration: f64) -> String {
    let mut list = String::new();
    for photo in photos {
        list.push_str(&format!("file '{}'\nduration {frame_duration:.2}\n", quote(photo)));
    }
    if let Some(last) = photos.last() {
        list.push_str(&format!("file '{}'\n", quote(last)));
    }
    list
}

/// Full ffmpeg argument list for a slideshow of `count` photos.
pub fn ffmpeg_args(
    concat: &Path,
    music: Option<&Path>,
    quality: Quality,
    frame_duration: f64,
    count: usize,
    output: &Path,
) -> Vec<OsString> {
    let scale = quality.scale();
    let fade_out_at = (frame_duration * count as f64 - FADE_SECS).max(0.0);
    let filter = format!(
        "scale={scale}:force_original_aspect_ratio=decrease,pad={scale}:(ow-iw)/2:(oh-ih)/2,setsar=1,\
         fade=t=in:st=0:d={FADE_SECS},fade=t=out:st={fade_out_at:.2}:d={FADE_SECS}"
    );

    let mut args: Vec<OsString> = ["-f", "concat", "-safe", "0", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(concat.into());
    if let Some(music) = music {
        args.extend(["-stream_loop", "-1", "-i"].map(OsString::from));
        args.push(music.into());
    }
    args.extend(
        [
            "-vf",
            filter.as_str(),
            "-c:v",
            "libx264",
            "-preset",
            "faster",
            "-threads",
            "0",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
        ]
        .map(OsString::from),
    );
    if music.is_some() {
        args.extend(["-c:a", "aac", "-b:a", "128k", "-shortest"].map(OsString::from));
    }
    args.push("-y".into());
    args.push(output.into());
    args
}

/// Chooses one entry uniformly at random.
pub fn pick_random<'a, R: Rng + ?Sized>(candidates: &'a [PathBuf], rng: &mut R) -> Option<&'a PathBuf> {
    candidates.choose(rng)
}

async fn mp3_files(music_dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(music_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::info!(dir = %music_dir.display(), "music directory unavailable: {e}");
            return Vec::new();
        }
    };
    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if is_mp3 && entry.file_type().await.is_ok_and(|t| t.is_file()) {
            files.push(path);
        }
    }
    files.sort();
    files
}

/// Background track: the requested file under `music_dir` when it exists,
/// otherwise a random `.mp3` from `music_dir`, otherwise none.
pub async fn select_music(music_dir: &Path, requested: Option<&str>) -> Option<PathBuf> {
    if let Some(name) = requested.filter(|n| !n.is_empty()) {
        if is_plain_name(name) {
            let path = music_dir.join(name);
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return Some(path);
            }
        }
        tracing::warn!(music = %name, "requested music not found; picking at random");
    }

    let candidates = mp3_files(music_dir).await;
    pick_random(&candidates, &mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn concat_repeats_last_and_escapes_quotes() {
        let photos = vec![PathBuf::from("/tmp/s/photo_0.jpg"), PathBuf::from("/tmp/s/it's.png")];
        assert_eq!(
            concat_list(&photos, 2.5),
            "file '/tmp/s/photo_0.jpg'\nduration 2.50\n\
             file '/tmp/s/it'\\''s.png'\nduration 2.50\n\
             file '/tmp/s/it'\\''s.png'\n"
        );
        assert_eq!(concat_list(&[], 1.0), "");
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn args_without_music() {
        let args = strings(&ffmpeg_args(
            Path::new("/w/concat.txt"),
            None,
            Quality::High,
            3.0,
            4,
            Path::new("/p/show.mp4"),
        ));
        assert_eq!(&args[..6], ["-f", "concat", "-safe", "0", "-i", "/w/concat.txt"]);
        let vf = &args[args.iter().position(|a| a == "-vf").unwrap() + 1];
        assert!(vf.starts_with("scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080"));
        assert!(vf.ends_with("fade=t=in:st=0:d=0.5,fade=t=out:st=11.50:d=0.5"));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(!args.iter().any(|a| a == "-shortest"));
        assert_eq!(&args[args.len() - 2..], ["-y", "/p/show.mp4"]);
    }

    #[test]
    fn args_with_music_loop_audio() {
        let args = strings(&ffmpeg_args(
            Path::new("c.txt"),
            Some(Path::new("/m/song.mp3")),
            Quality::Medium,
            0.2,
            1,
            Path::new("o.mp4"),
        ));
        assert!(args.windows(4).any(|w| w == ["-stream_loop", "-1", "-i", "/m/song.mp3"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.iter().any(|a| a == "-shortest"));
        // Fade-out never starts before zero.
        assert!(args.iter().any(|a| a.ends_with("fade=t=out:st=0.00:d=0.5")));
    }

    #[test]
    fn pick_random_is_within_candidates() {
        let mut rng = StdRng::seed_from_u64(7);
        let songs = vec![PathBuf::from("a.mp3"), PathBuf::from("b.mp3")];
        for _ in 0..10 {
            assert!(songs.contains(pick_random(&songs, &mut rng).unwrap()));
        }
        assert!(pick_random(&[], &mut rng).is_none());
    }

    #[tokio::test]
    async fn music_selection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("calm.MP3"), b"m").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"t").unwrap();
        std::fs::write(dir.path().join("intro.wav"), b"w").unwrap();

        assert_eq!(
            select_music(dir.path(), Some("intro.wav")).await,
            Some(dir.path().join("intro.wav"))
        );
        // Missing or unsafe requests fall back to a random mp3.
        assert_eq!(
            select_music(dir.path(), Some("missing.mp3")).await,
            Some(dir.path().join("calm.MP3"))
        );
        assert_eq!(
            select_music(dir.path(), Some("../calm.MP3")).await,
            Some(dir.path().join("calm.MP3"))
        );
        assert_eq!(select_music(&dir.path().join("none"), None).await, None);
    }
}
