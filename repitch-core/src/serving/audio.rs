//! Byte-range file responses for cached audio.
//!
//! Every request opens the file, seeks to the first requested byte and
//! streams only the requested span, so a player seeking back and forth never
//! forces a full read.

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, stream};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::range::{RangeSpec, unsatisfied_content_range};
use super::{ServeError, ServeResult};

/// Status, headers and streaming body of a file response.
#[derive(Debug)]
pub struct AudioReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl IntoResponse for AudioReply {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Serves files with `Range` support.
#[derive(Debug, Clone, Copy)]
pub struct AudioRangeServer {
    chunk_size: usize,
}

impl AudioRangeServer {
    /// Creates a server streaming bodies in `chunk_size` byte chunks.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Builds the response for `path` given the request's `Range` header.
    ///
    /// - No header, or one that cannot be parsed: 200 with the whole file.
    /// - Satisfiable range: 206 with `Content-Range` and only that span.
    /// - Unsatisfiable range: 416 with `Content-Range: bytes */total`.
    ///
    /// # Errors
    ///
    /// - `ServeError::NotFound` - `path` does not exist
    /// - `ServeError::Io` - The file could not be opened, inspected or seeked
    pub async fn serve(&self, path: &Path, range_header: Option<&str>) -> ServeResult<AudioReply> {
        let mut file = File::open(path).await.map_err(|e| ServeError::from_open(path, e))?;
        let total_size = file
            .metadata()
            .await
            .map_err(|source| ServeError::Io {
                operation: format!("stat {}", path.display()),
                source,
            })?
            .len();

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::CONTENT_TYPE, content_type(path));

        let requested = match range_header.map(RangeSpec::parse) {
            None => None,
            Some(Ok(spec)) => Some(spec),
            Some(Err(e)) => {
                tracing::debug!("Ignoring range header for {}: {}", path.display(), e);
                None
            }
        };

        let span = match requested.map(|spec| spec.resolve(total_size)) {
            None => None,
            Some(Ok(range)) => Some(range),
            Some(Err(e)) => {
                tracing::debug!("Rejecting range for {}: {}", path.display(), e);
                insert_header(
                    &mut headers,
                    header::CONTENT_RANGE,
                    &unsatisfied_content_range(total_size),
                );
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                return Ok(AudioReply {
                    status: StatusCode::RANGE_NOT_SATISFIABLE,
                    headers,
                    body: Body::empty(),
                });
            }
        };

        let (status, start, length) = match span {
            Some(range) => {
                insert_header(
                    &mut headers,
                    header::CONTENT_RANGE,
                    &range.content_range(total_size),
                );
                (StatusCode::PARTIAL_CONTENT, range.start, range.len())
            }
            None => (StatusCode::OK, 0, total_size),
        };
        insert_header(&mut headers, header::CONTENT_LENGTH, &length.to_string());

        if start > 0 {
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|source| ServeError::Io {
                    operation: format!("seek {} to {}", path.display(), start),
                    source,
                })?;
        }

        tracing::debug!(
            "Serving {} bytes of {} starting at {} ({})",
            length,
            path.display(),
            start,
            status
        );

        Ok(AudioReply {
            status,
            headers,
            body: Body::from_stream(read_span(file, length, self.chunk_size)),
        })
    }
}

fn content_type(path: &Path) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_raw().unwrap_or("audio/wav");
    HeaderValue::from_str(mime).unwrap_or(HeaderValue::from_static("audio/wav"))
}

fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Streams exactly `length` bytes from the file's current position.
fn read_span(
    file: File,
    length: u64,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    stream::unfold((file, length), move |(mut file, remaining)| async move {
        if remaining == 0 {
            return None;
        }

        let want = usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size));
        let mut buffer = vec![0u8; want];

        match file.read(&mut buffer).await {
            Ok(0) => Some((
                Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file shrank while streaming",
                )),
                (file, 0),
            )),
            Ok(read) => {
                buffer.truncate(read);
                Some((Ok(Bytes::from(buffer)), (file, remaining - read as u64)))
            }
            Err(e) => Some((Err(e), (file, 0))),
        }
    })
}
