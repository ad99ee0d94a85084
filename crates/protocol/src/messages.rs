//! JSON payloads carried inside frames.
//!
//! All fields default when absent so a structurally valid JSON object always
//! parses; required-field checks belong to the receiver.

use serde::{Deserialize, Deserializer, Serialize};

/// Default page size for thumbnail listing.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Single-shot file upload (image or video message types).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    #[serde(default)]
    pub id: String,
    /// Base64 (standard alphabet) file bytes.
    #[serde(default)]
    pub data: String,
    /// Short media-type token such as `jpg` or `mp4`.
    #[serde(default)]
    pub media: String,
}

impl FileUpload {
    /// Name of the first required field that is missing or empty.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.id.is_empty() {
            Some("id")
        } else if self.data.is_empty() {
            Some("data")
        } else if self.media.is_empty() {
            Some("media")
        } else {
            None
        }
    }
}

/// Opens a chunked video transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStart {
    #[serde(default)]
    pub id: String,
    /// Optional media-type token; used when `id` carries no extension.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media: String,
    #[serde(default)]
    pub total_size: i64,
    #[serde(default)]
    pub chunk_size: i64,
    /// Client-declared chunk count (advisory).
    #[serde(default)]
    pub total_chunks: i64,
}

/// One chunk of a transfer opened by [`ChunkStart`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub chunk_index: i64,
    /// Base64 chunk bytes.
    #[serde(default)]
    pub data: String,
}

/// Closes a chunked transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkComplete {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub total_chunks: i64,
}

/// Paged thumbnail catalog request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbListRequest {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub page_index: i64,
    #[serde(default = "default_page_size", deserialize_with = "null_as_zero")]
    pub page_size: i64,
}

/// `null` reads as 0, which [`ThumbListRequest::normalized`] then resets.
/// A non-integer number still fails the whole request.
fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE as i64
}

impl Default for ThumbListRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: default_page_size(),
        }
    }
}

impl ThumbListRequest {
    /// Parses a request payload. An empty payload means "first page".
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        if payload.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(payload)
    }

    /// Returns `(page_index, page_size)` with out-of-range values reset:
    /// a negative index becomes 0 and a non-positive size becomes
    /// [`DEFAULT_PAGE_SIZE`].
    pub fn normalized(&self) -> (usize, usize) {
        let index = usize::try_from(self.page_index).unwrap_or(0);
        let size = match usize::try_from(self.page_size) {
            Ok(size) if size > 0 => size,
            _ => DEFAULT_PAGE_SIZE,
        };
        (index, size)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbRecord {
    /// Thumbnail basename without the `tbn-` prefix or extension.
    pub id: String,
    /// Base64 thumbnail bytes.
    pub data: String,
    /// `jpg`, `png` or `video`.
    pub media: String,
}

/// Reply to a thumbnail list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbListResponse {
    pub photos: Vec<ThumbRecord>,
}

/// Acknowledgment bodies sent in ACK frames.
pub mod ack {
    /// Reply to a chunked transfer start.
    pub const START: &str = "OK:START";

    /// Reply to a stored chunk.
    pub fn chunk(index: i64) -> String {
        format!("OK:CHUNK:{index}")
    }

    /// Reply to a stored file (direct upload or finalized transfer).
    pub fn saved(id: &str) -> String {
        format!("OK:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_upload_missing_fields() {
        let full = FileUpload {
            id: "img001".into(),
            data: "AAAA".into(),
            media: "png".into(),
        };
        assert_eq!(full.missing_field(), None);

        let no_media: FileUpload =
            serde_json::from_str(r#"{"id":"img001","data":"AAAA"}"#).unwrap();
        assert_eq!(no_media.missing_field(), Some("media"));

        let empty_id: FileUpload =
            serde_json::from_str(r#"{"id":"","data":"AAAA","media":"png"}"#).unwrap();
        assert_eq!(empty_id.missing_field(), Some("id"));
    }

    #[test]
    fn chunk_start_uses_camel_case() {
        let start: ChunkStart = serde_json::from_str(
            r#"{"id":"vid1","totalSize":4,"chunkSize":2,"totalChunks":2}"#,
        )
        .unwrap();
        assert_eq!(start.id, "vid1");
        assert_eq!(start.total_size, 4);
        assert_eq!(start.chunk_size, 2);
        assert_eq!(start.total_chunks, 2);
        assert!(start.media.is_empty());
    }

    #[test]
    fn chunk_data_parses_index() {
        let data: ChunkData =
            serde_json::from_str(r#"{"id":"vid1","chunkIndex":7,"data":"QUE="}"#).unwrap();
        assert_eq!(data.chunk_index, 7);
        assert_eq!(data.data, "QUE=");
    }

    #[test]
    fn thumb_list_empty_payload_is_first_page() {
        let req = ThumbListRequest::parse(b"").unwrap();
        assert_eq!(req.normalized(), (0, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn thumb_list_out_of_range_values_reset() {
        let req = ThumbListRequest::parse(br#"{"pageIndex":-5,"pageSize":0}"#).unwrap();
        assert_eq!(req.normalized(), (0, 100));

        let req = ThumbListRequest::parse(br#"{"pageIndex":3,"pageSize":-1}"#).unwrap();
        assert_eq!(req.normalized(), (3, 100));
    }

    #[test]
    fn thumb_list_partial_fields() {
        let req = ThumbListRequest::parse(br#"{"pageIndex":2}"#).unwrap();
        assert_eq!(req.normalized(), (2, 100));

        let req = ThumbListRequest::parse(br#"{"pageSize":25}"#).unwrap();
        assert_eq!(req.normalized(), (0, 25));
    }

    #[test]
    fn thumb_list_null_keeps_other_field() {
        let req = ThumbListRequest::parse(br#"{"pageIndex":null,"pageSize":25}"#).unwrap();
        assert_eq!(req.normalized(), (0, 25));

        let req = ThumbListRequest::parse(br#"{"pageIndex":4,"pageSize":null}"#).unwrap();
        assert_eq!(req.normalized(), (4, 100));
    }

    #[test]
    fn thumb_list_invalid_json_is_error() {
        assert!(ThumbListRequest::parse(b"not json").is_err());
        assert!(ThumbListRequest::parse(br#"{"pageIndex":1.5,"pageSize":25}"#).is_err());
        assert!(ThumbListRequest::parse(br#"{"pageIndex":"2"}"#).is_err());
    }

    #[test]
    fn thumb_list_response_shape() {
        let resp = ThumbListResponse {
            photos: vec![ThumbRecord {
                id: "img001".into(),
                data: "AAAA".into(),
                media: "png".into(),
            }],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"photos":[{"id":"img001","data":"AAAA","media":"png"}]})
        );

        let empty = serde_json::to_string(&ThumbListResponse::default()).unwrap();
        assert_eq!(empty, r#"{"photos":[]}"#);
    }

    #[test]
    fn ack_bodies() {
        assert_eq!(ack::START, "OK:START");
        assert_eq!(ack::chunk(1), "OK:CHUNK:1");
        assert_eq!(ack::saved("vid1"), "OK:vid1");
    }
}
