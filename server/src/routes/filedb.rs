//! The FileDB resource handler.
//!
//! - `POST   /filedb`                 store the request body, reply with its id
//! - `GET    /filedb/{id}`            download (verified unless `nocheck`)
//! - `GET    /filedb/{id}?query=...`  one metadata field as plain text
//! - `PUT    /filedb/{id}`            add a reference
//! - `DELETE /filedb/{id}`            drop a reference
//!
//! ## Metadata fields
//!
//! `sha256sum`, `size`, `hardlinks`, `mimetype`, `accessed`, `last_access`,
//! `created`, `exists`. The two timestamps are rendered with `time_format`
//! (query parameter, falling back to `data.time_format`); a record that was
//! never read reports `last_access` as `never`. `metadata=` is accepted as an
//! alias of `query=`.
//!
//! ## Downloads
//!
//! Blobs are streamed from disk. A `Range` header yields `206 Partial Content`
//! with a `Content-Range` header; `encoding=base64` returns the whole blob
//! base64-encoded instead.

use std::io::SeekFrom;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use crate::range::parse_range;
use crate::state::AppState;
use crate::store::{FileRecord, StoreError};

type ApiError = (StatusCode, Json<Value>);

/// Query parameters for `GET /filedb/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct GetQuery {
    /// Metadata field to return instead of the data.
    #[serde(alias = "metadata")]
    pub query: Option<String>,
    /// Skip SHA-256 verification of the blob.
    #[serde(default, deserialize_with = "flag")]
    pub nocheck: bool,
    /// `strftime` format for `created` / `last_access`.
    pub time_format: Option<String>,
    /// `base64` to receive the data as base64 text.
    pub encoding: Option<String>,
}

/// Accept `nocheck`, `nocheck=1`, `nocheck=true`, `nocheck=True` and friends.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        None => false,
        Some(v) => !matches!(
            v.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
    })
}

fn api_error(status: StatusCode, message: &str, code: &str) -> ApiError {
    (status, Json(json!({"error": message, "code": code})))
}

/// Parse the `{ident}` path segment.
fn parse_ident(raw: &str) -> Result<u64, ApiError> {
    raw.parse().map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            "Invalid identifier",
            "INVALID_IDENTIFIER",
        )
    })
}

/// Map a store error to an HTTP error.
///
/// | HTTP | Code              | Meaning                              |
/// |------|-------------------|--------------------------------------|
/// | 400  | `EMPTY_FILE`      | Upload had no content                |
/// | 400  | `FILE_TOO_LARGE`  | Upload exceeds `max_file_size`       |
/// | 404  | `FILE_NOT_FOUND`  | No record with this id               |
/// | 500  | `BLOB_MISSING`    | Record exists, blob is gone          |
/// | 500  | `CORRUPTED`       | Blob checksum does not match         |
/// | 500  | `PERMISSION_DENIED` | Blob not readable by the server    |
/// | 500  | `IO_ERROR`        | Other I/O failure                    |
fn store_error(e: &StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "No such file", "FILE_NOT_FOUND")
        }
        StoreError::EmptyFile => api_error(StatusCode::BAD_REQUEST, &e.to_string(), "EMPTY_FILE"),
        StoreError::TooLarge { .. } => {
            api_error(StatusCode::BAD_REQUEST, &e.to_string(), "FILE_TOO_LARGE")
        }
        StoreError::BlobMissing(_) => {
            error!("{e}");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "File not found",
                "BLOB_MISSING",
            )
        }
        StoreError::ChecksumMismatch { .. } => {
            error!("{e}");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Corrupted file",
                "CORRUPTED",
            )
        }
        StoreError::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("{e}");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cannot read file",
                "PERMISSION_DENIED",
            )
        }
        StoreError::Io(_) => {
            error!("{e}");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
                "IO_ERROR",
            )
        }
    }
}

fn io_error(e: &std::io::Error) -> ApiError {
    if e.kind() == std::io::ErrorKind::NotFound {
        store_error(&StoreError::BlobMissing(std::path::PathBuf::new()))
    } else {
        error!("Blob read failed: {e}");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Cannot read file",
            "IO_ERROR",
        )
    }
}

fn plain_text(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// `POST /filedb`: store the raw request body.
///
/// Replies with the record id as plain text. Content already present is not
/// stored twice; its reference counter is incremented and the existing id
/// returned.
pub async fn post_file(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let record = state.store.add(&body).await.map_err(|e| store_error(&e))?;
    Ok(plain_text(record.id.to_string()))
}

/// `GET /filedb`: the identifier is mandatory.
pub async fn missing_ident() -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "Missing identifier",
        "MISSING_IDENTIFIER",
    )
}

/// `GET /filedb/{id}`: file data or a single metadata field.
pub async fn get_file(
    State(state): State<AppState>,
    Path(ident): Path<String>,
    Query(query): Query<GetQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = parse_ident(&ident)?;

    if let Some(field) = query.query.as_deref() {
        let time_format = query
            .time_format
            .as_deref()
            .unwrap_or(&state.config.data.time_format);
        return metadata(&state, id, field, time_format).await;
    }

    let (record, path) = state
        .store
        .open_data(id, !query.nocheck)
        .await
        .map_err(|e| store_error(&e))?;

    if query.encoding.as_deref() == Some("base64") {
        use base64::Engine;
        let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(&e))?;
        return Ok(plain_text(
            base64::engine::general_purpose::STANDARD.encode(bytes),
        ));
    }

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| io_error(&e))?;
    let content_type = HeaderValue::from_str(&record.mimetype)
        .unwrap_or(HeaderValue::from_static(crate::store::mime::OCTET_STREAM));

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, record.size));

    let Some(range) = range else {
        let body = Body::from_stream(ReaderStream::new(file));
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
                (header::CONTENT_LENGTH, HeaderValue::from(record.size)),
            ],
            body,
        )
            .into_response());
    };

    file.seek(SeekFrom::Start(range.start))
        .await
        .map_err(|e| io_error(&e))?;
    let body = Body::from_stream(ReaderStream::new(file.take(range.byte_count())));
    let content_range = HeaderValue::from_str(&range.content_range()).map_err(|_| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid range",
            "IO_ERROR",
        )
    })?;
    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
            (header::CONTENT_RANGE, content_range),
            (header::CONTENT_LENGTH, HeaderValue::from(range.byte_count())),
        ],
        body,
    )
        .into_response())
}

/// Render one metadata field of record `id`.
async fn metadata(
    state: &AppState,
    id: u64,
    field: &str,
    time_format: &str,
) -> Result<Response, ApiError> {
    let record = state.store.get(id).await.map_err(|e| store_error(&e))?;
    render_field(&record, field, time_format).map(plain_text)
}

/// Format a single [`FileRecord`] field as text.
pub fn render_field(
    record: &FileRecord,
    field: &str,
    time_format: &str,
) -> Result<String, ApiError> {
    use std::fmt::Write;

    let format_time = |t: &chrono::DateTime<chrono::Local>| {
        // chrono reports bad format strings through fmt::Error.
        let mut out = String::new();
        write!(out, "{}", t.format(time_format)).map(|()| out).map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                "Invalid time format",
                "INVALID_TIME_FORMAT",
            )
        })
    };

    Ok(match field {
        "sha256sum" => record.sha256sum.clone(),
        "size" => record.size.to_string(),
        "hardlinks" => record.hardlinks.to_string(),
        "mimetype" => record.mimetype.clone(),
        "accessed" => record.accessed.to_string(),
        "exists" => "true".to_string(),
        "created" => format_time(&record.created)?,
        "last_access" => match &record.last_access {
            Some(t) => format_time(t)?,
            None => "never".to_string(),
        },
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Invalid query",
                "INVALID_QUERY",
            ))
        }
    })
}

/// `PUT /filedb/{id}`: add a reference to an existing file.
pub async fn put_file(
    State(state): State<AppState>,
    Path(ident): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_ident(&ident)?;
    let record = state.store.link(id).await.map_err(|e| store_error(&e))?;
    info!("Linked #{} (hardlinks={})", record.id, record.hardlinks);
    Ok(plain_text(record.hardlinks.to_string()))
}

/// `DELETE /filedb/{id}`: drop a reference, removing the file with the last one.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(ident): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_ident(&ident)?;
    let outcome = state
        .store
        .unlink(id, false)
        .await
        .map_err(|e| store_error(&e))?;
    Ok(Json(json!(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn record() -> FileRecord {
        FileRecord {
            id: 7,
            mimetype: "image/png".into(),
            sha256sum: "ab".repeat(32),
            size: 1234,
            hardlinks: 2,
            created: Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
            last_access: None,
            accessed: 0,
        }
    }

    #[test]
    fn test_render_plain_fields() {
        let r = record();
        let fmt = "%Y-%m-%dT%H:%M:%S";
        assert_eq!(render_field(&r, "size", fmt).unwrap(), "1234");
        assert_eq!(render_field(&r, "hardlinks", fmt).unwrap(), "2");
        assert_eq!(render_field(&r, "mimetype", fmt).unwrap(), "image/png");
        assert_eq!(render_field(&r, "exists", fmt).unwrap(), "true");
        assert_eq!(render_field(&r, "sha256sum", fmt).unwrap(), "ab".repeat(32));
    }

    #[test]
    fn test_render_times() {
        let mut r = record();
        assert_eq!(
            render_field(&r, "created", "%Y-%m-%dT%H:%M:%S").unwrap(),
            "2024-03-01T12:30:05"
        );
        assert_eq!(render_field(&r, "created", "%d.%m.%Y").unwrap(), "01.03.2024");
        assert_eq!(render_field(&r, "last_access", "%Y").unwrap(), "never");
        r.last_access = Some(Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(render_field(&r, "last_access", "%Y").unwrap(), "2025");
    }

    #[test]
    fn test_render_invalid_query() {
        let (status, _) = render_field(&record(), "owner", "%Y").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_render_invalid_time_format() {
        let (status, Json(body)) = render_field(&record(), "created", "%Y-%").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_TIME_FORMAT");
        // "never" needs no formatting.
        assert_eq!(render_field(&record(), "last_access", "%").unwrap(), "never");
    }

    #[test]
    fn test_store_error_mapping() {
        let cases = [
            (
                StoreError::NotFound(crate::store::Ident::Id(1)),
                StatusCode::NOT_FOUND,
                "No such file",
            ),
            (
                StoreError::BlobMissing("/x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "File not found",
            ),
            (
                StoreError::ChecksumMismatch {
                    expected: "a".into(),
                    actual: "b".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "Corrupted file",
            ),
            (
                StoreError::Io(std::io::ErrorKind::PermissionDenied.into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cannot read file",
            ),
        ];
        for (err, status, message) in cases {
            let (got, Json(body)) = store_error(&err);
            assert_eq!(got, status, "{err}");
            assert_eq!(body["error"], message);
        }

        let (status, Json(body)) = io_error(&std::io::ErrorKind::NotFound.into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "File not found");
        let (_, Json(body)) = io_error(&std::io::ErrorKind::PermissionDenied.into());
        assert_eq!(body["error"], "Cannot read file");
    }

    #[test]
    fn test_parse_ident() {
        assert_eq!(parse_ident("42").unwrap(), 42);
        assert_eq!(parse_ident("abc").unwrap_err().0, StatusCode::BAD_REQUEST);
        assert_eq!(parse_ident("-1").unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
