/// Extension used when a media token is empty or unsafe.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Extension for chunked uploads whose container could not be determined.
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Normalizes a client-supplied media token into a file extension.
///
/// Lowercases and drops a leading dot. Tokens that are empty or contain a
/// path separator become [`FALLBACK_EXTENSION`].
pub fn sanitize_media_token(media: &str) -> String {
    let token = media.trim().trim_start_matches('.').to_ascii_lowercase();
    if token.is_empty() || token.contains('/') || token.contains('\\') {
        return FALLBACK_EXTENSION.to_string();
    }
    token
}

/// Builds `<id>.<ext>`, or `id` unchanged when it already ends with `.<ext>`
/// (case-insensitive).
pub fn resolve_file_name(id: &str, ext: &str) -> String {
    let suffix = format!(".{ext}");
    let has_ext = id.len() > suffix.len()
        && id
            .get(id.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(&suffix));
    if has_ext {
        id.to_string()
    } else {
        format!("{id}{suffix}")
    }
}
