use std::io::Read;
use std::path::Path;

/// Bytes needed by every sniffer in this module.
pub const SNIFF_LEN: usize = 16;

const HEIC_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1",
];

/// Reads up to [`SNIFF_LEN`] leading bytes of a file.
pub fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}

/// Returns `true` if `head` is an ISO-BMFF header with a HEIC/HEIF brand.
pub fn sniff_is_heic(head: &[u8]) -> bool {
    if head.len() < 12 || &head[4..8] != b"ftyp" {
        return false;
    }
    HEIC_BRANDS.iter().any(|brand| &head[8..12] == *brand)
}

/// Returns `true` if `head` starts with the JPEG start-of-image marker.
pub fn sniff_is_jpeg(head: &[u8]) -> bool {
    head.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// Guesses a video container extension from leading bytes.
///
/// HEIC brands are not videos and yield `None`.
pub fn sniff_video_extension(head: &[u8]) -> Option<&'static str> {
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        if sniff_is_heic(head) {
            return None;
        }
        if &head[8..12] == b"qt  " {
            return Some("mov");
        }
        return Some("mp4");
    }
    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"AVI " {
        return Some("avi");
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("mkv");
    }
    None
}
