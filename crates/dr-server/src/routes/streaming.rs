//! Range-aware file streaming.
//!
//! Every request opens its own file handle and reads through a bounded
//! `ReaderStream`, so memory stays flat regardless of file size and
//! concurrent readers never share a cursor.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use dr_core::media::guess_content_type;

/// Read size for streamed bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// A syntactically valid `Range` request, before it is checked against the
/// file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// `bytes=START-` or `bytes=START-END`.
    From { start: u64, end: Option<u64> },
    /// `bytes=-N`: the last N bytes.
    Suffix(u64),
}

impl RangeRequest {
    /// Inclusive `(start, end)` within a file of `size` bytes, or `None` if
    /// nothing in the file satisfies the range.
    pub fn resolve(self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        match self {
            RangeRequest::From { start, end } => {
                if start >= size {
                    return None;
                }
                let end = end.map_or(size - 1, |e| e.min(size - 1));
                Some((start, end))
            }
            RangeRequest::Suffix(0) => None,
            RangeRequest::Suffix(n) => Some((size.saturating_sub(n), size - 1)),
        }
    }
}

/// Parse a `Range` header value.
///
/// Only the first range of a multi-range list is honored. Anything that does
/// not parse returns `None` and the caller serves the whole file.
pub fn parse_range_header(value: &str) -> Option<RangeRequest> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    let first = ranges.split(',').next()?.trim();
    let (start_str, end_str) = first.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        let suffix: u64 = end_str.parse().ok()?;
        return Some(RangeRequest::Suffix(suffix));
    }

    let start: u64 = start_str.parse().ok()?;
    let end = if end_str.is_empty() {
        None
    } else {
        let end: u64 = end_str.parse().ok()?;
        if end < start {
            return None;
        }
        Some(end)
    };

    Some(RangeRequest::From { start, end })
}

/// Serve `file_path`, honoring `range_header` when present.
///
/// The caller has already validated the path against the sandbox.
pub async fn serve_file_streaming(
    file_path: &Path,
    range_header: Option<&str>,
) -> Result<Response, dr_core::Error> {
    let metadata = match tokio::fs::metadata(file_path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(dr_core::Error::not_found("file", file_path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(dr_core::Error::not_found("file", file_path.display()))
        }
        Err(e) => return Err(e.into()),
    };

    let file_size = metadata.len();
    let content_type = guess_content_type(file_path);

    let range = match range_header.and_then(parse_range_header) {
        Some(request) => match request.resolve(file_size) {
            Some(bounds) => Some(bounds),
            None => {
                tracing::debug!(
                    path = %file_path.display(),
                    range = range_header.unwrap_or_default(),
                    file_size,
                    "Unsatisfiable range"
                );
                return Ok((
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{file_size}"))],
                    Body::empty(),
                )
                    .into_response());
            }
        },
        None => None,
    };

    let mut file = tokio::fs::File::open(file_path).await?;

    match range {
        Some((start, end)) => {
            let length = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start)).await?;

            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{file_size}")),
                    (header::CONTENT_LENGTH, length.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body_from(file, length, file_path),
            )
                .into_response())
        }
        None => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CONTENT_LENGTH, file_size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body_from(file, file_size, file_path),
        )
            .into_response()),
    }
}

/// Stream exactly `length` bytes from the file's current position.
///
/// A read error ends the body early; hyper then aborts the connection
/// rather than pretending the response completed.
fn body_from(file: tokio::fs::File, length: u64, file_path: &Path) -> Body {
    let path = file_path.display().to_string();
    let stream = ReaderStream::with_capacity(file.take(length), CHUNK_SIZE).map_err(move |source| {
        tracing::warn!(path = %path, error = %source, "Read failed mid-stream; aborting response");
        dr_core::Error::StreamIo { source }
    });
    Body::from_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn parse_closed_range() {
        assert_eq!(
            parse_range_header("bytes=10-20"),
            Some(RangeRequest::From { start: 10, end: Some(20) })
        );
    }

    #[test]
    fn parse_open_range() {
        assert_eq!(
            parse_range_header("bytes=500-"),
            Some(RangeRequest::From { start: 500, end: None })
        );
    }

    #[test]
    fn parse_suffix_range() {
        assert_eq!(parse_range_header("bytes=-100"), Some(RangeRequest::Suffix(100)));
    }

    #[test]
    fn multi_range_uses_first() {
        assert_eq!(
            parse_range_header("bytes=0-99, 200-299"),
            Some(RangeRequest::From { start: 0, end: Some(99) })
        );
    }

    #[test]
    fn parse_invalid() {
        assert!(parse_range_header("invalid").is_none());
        assert!(parse_range_header("bytes=abc-def").is_none());
        assert!(parse_range_header("bytes=20-10").is_none());
        assert!(parse_range_header("items=0-1").is_none());
        assert!(parse_range_header("bytes=-").is_none());
    }

    #[test]
    fn resolve_clamps_end() {
        let r = RangeRequest::From { start: 900, end: Some(5000) };
        assert_eq!(r.resolve(1000), Some((900, 999)));
        assert_eq!(RangeRequest::From { start: 0, end: None }.resolve(1000), Some((0, 999)));
    }

    #[test]
    fn resolve_suffix() {
        assert_eq!(RangeRequest::Suffix(100).resolve(1000), Some((900, 999)));
        assert_eq!(RangeRequest::Suffix(5000).resolve(1000), Some((0, 999)));
        assert_eq!(RangeRequest::Suffix(0).resolve(1000), None);
    }

    #[test]
    fn resolve_unsatisfiable() {
        assert_eq!(RangeRequest::From { start: 1000, end: None }.resolve(1000), None);
        assert_eq!(RangeRequest::From { start: 0, end: None }.resolve(0), None);
    }

    fn fixture() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, data).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn serves_partial_content() {
        let (_dir, path) = fixture();
        let response = serve_file_streaming(&path, Some("bytes=100-199")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), 100);
        assert_eq!(body[0], (100 % 251) as u8);
    }

    #[tokio::test]
    async fn serves_full_content_with_accept_ranges() {
        let (_dir, path) = fixture();
        let response = serve_file_streaming(&path, None).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), 1000);
    }

    #[tokio::test]
    async fn malformed_range_serves_everything() {
        let (_dir, path) = fixture();
        let response = serve_file_streaming(&path, Some("bytes=oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unsatisfiable_range_is_416() {
        let (_dir, path) = fixture();
        let response = serve_file_streaming(&path, Some("bytes=5000-")).await.unwrap();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (dir, _path) = fixture();
        let err = serve_file_streaming(&dir.path().join("nope.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, dr_core::Error::NotFound { .. }));

        let err = serve_file_streaming(dir.path(), None).await.unwrap_err();
        assert!(matches!(err, dr_core::Error::NotFound { .. }));
    }
}
