/// Default TCP port for sync sessions.
pub const DEFAULT_TCP_PORT: u16 = 9922;

/// Default UDP port for the discovery responder.
pub const DEFAULT_UDP_PORT: u16 = 7799;

/// Default maximum frame payload (500 MiB).
///
/// Large enough for single-shot video uploads; chunked transfers keep
/// individual frames far below this.
pub const DEFAULT_MAX_PAYLOAD: usize = 500 * 1024 * 1024;

/// Message type code carried in the first header byte.
///
/// Only the codes listed here are considered well-formed. Anything else
/// means the stream can no longer be trusted to be in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Single-shot image upload (JSON `{id, data, media}`).
    ImageData = 1,
    /// Single-shot video upload (same payload as [`ImageData`](Self::ImageData)).
    VideoData = 2,
    /// Client finished syncing. Shares its code with server ACK frames.
    SyncComplete = 3,
    /// Raw UTF-8 phone name selecting the sync subdirectory.
    SetPhoneName = 4,
    GetMediaCount = 5,
    /// Server reply to [`GetMediaCount`](Self::GetMediaCount): 4-byte BE count.
    MediaCountResponse = 6,
    MediaThumbList = 7,
    /// Server reply to [`MediaThumbList`](Self::MediaThumbList).
    MediaThumbData = 8,
    ChunkedVideoStart = 13,
    ChunkedVideoData = 14,
    ChunkedVideoComplete = 15,
}

impl MessageType {
    /// Server acknowledgment frames reuse the sync-complete code; the
    /// direction of travel disambiguates.
    pub const ACK: u8 = MessageType::SyncComplete as u8;

    /// Maps a raw type byte to a known message type.
    pub fn from_u8(code: u8) -> Option<Self> {
        let t = match code {
            1 => Self::ImageData,
            2 => Self::VideoData,
            3 => Self::SyncComplete,
            4 => Self::SetPhoneName,
            5 => Self::GetMediaCount,
            6 => Self::MediaCountResponse,
            7 => Self::MediaThumbList,
            8 => Self::MediaThumbData,
            13 => Self::ChunkedVideoStart,
            14 => Self::ChunkedVideoData,
            15 => Self::ChunkedVideoComplete,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for types a client may send to the server.
    pub fn is_request(self) -> bool {
        !matches!(self, Self::MediaCountResponse | Self::MediaThumbData)
    }

    /// Human-readable name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::ImageData => "IMAGE_DATA",
            Self::VideoData => "VIDEO_DATA",
            Self::SyncComplete => "SYNC_COMPLETE",
            Self::SetPhoneName => "SET_PHONE_NAME",
            Self::GetMediaCount => "GET_MEDIA_COUNT",
            Self::MediaCountResponse => "MEDIA_COUNT_RSP",
            Self::MediaThumbList => "MEDIA_THUMB_LIST",
            Self::MediaThumbData => "MEDIA_THUMB_DATA",
            Self::ChunkedVideoStart => "CHUNKED_VIDEO_START",
            Self::ChunkedVideoData => "CHUNKED_VIDEO_DATA",
            Self::ChunkedVideoComplete => "CHUNKED_VIDEO_COMPLETE",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}
