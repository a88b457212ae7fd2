//! HTTP client for filedb REST endpoints.
//!
//! [`FileDbClient`] wraps `reqwest::Client` and provides typed methods for
//! each FileDB operation. Data travels as raw bytes, metadata as plain text.
//!
//! ## Authentication
//!
//! The access key is sent as a Bearer token. The server also accepts it as a
//! `?key=` query parameter, which older clients use.
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for an `error` field in the JSON body. If
//! parsing fails, the raw response body is returned as the error message.

use std::time::Duration;

use chrono::NaiveDateTime;

/// Format the client asks the server to render timestamps in.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// HTTP client for a filedb server.
pub struct FileDbClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    time_format: String,
}

impl FileDbClient {
    /// Create a client for the FileDB handler at `base_url`, e.g.
    /// `http://127.0.0.1:8080/filedb`.
    pub fn new(base_url: &str, key: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(ClientError::Request)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        })
    }

    /// Use a different `strftime` format for timestamp round trips.
    #[must_use]
    pub fn with_time_format(mut self, time_format: &str) -> Self {
        self.time_format = time_format.to_string();
        self
    }

    /// The handler's base URL (without trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `path` onto the base URL with exactly one slash between them.
    pub fn url(&self, path: impl std::fmt::Display) -> String {
        let path = path.to_string();
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// `POST /filedb`: store `data`, returning the record id.
    ///
    /// Empty data is refused locally without contacting the server.
    pub async fn add(&self, data: Vec<u8>) -> Result<u64, ClientError> {
        if data.is_empty() {
            return Err(ClientError::EmptyFile);
        }
        let resp = self
            .http
            .post(self.url(""))
            .bearer_auth(&self.key)
            .body(data)
            .send()
            .await
            .map_err(ClientError::Request)?;
        let text = Self::handle_response(resp).await?;
        parse_text(&text)
    }

    /// `GET /filedb/{id}`: fetch the data. `nocheck` skips server-side
    /// checksum verification.
    pub async fn get(&self, id: u64, nocheck: bool) -> Result<Vec<u8>, ClientError> {
        let mut request = self.http.get(self.url(id)).bearer_auth(&self.key);
        if nocheck {
            request = request.query(&[("nocheck", "true")]);
        }
        let resp = request.send().await.map_err(ClientError::Request)?;
        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await.map_err(ClientError::Request)?;
            Ok(bytes.to_vec())
        } else {
            Err(Self::server_error(resp).await)
        }
    }

    /// `PUT /filedb/{id}`: add a reference, returning the new reference count.
    pub async fn put(&self, id: u64) -> Result<u32, ClientError> {
        let resp = self
            .http
            .put(self.url(id))
            .bearer_auth(&self.key)
            .send()
            .await
            .map_err(ClientError::Request)?;
        let text = Self::handle_response(resp).await?;
        parse_text(&text)
    }

    /// `DELETE /filedb/{id}`: drop a reference. Returns whether the server
    /// accepted the request.
    pub async fn delete(&self, id: u64) -> Result<bool, ClientError> {
        let resp = self
            .http
            .delete(self.url(id))
            .bearer_auth(&self.key)
            .send()
            .await
            .map_err(ClientError::Request)?;
        Ok(resp.status().is_success())
    }

    /// `GET /filedb/{id}?query={field}`: one metadata field as text.
    pub async fn metadata(&self, id: u64, field: &str) -> Result<String, ClientError> {
        let resp = self.metadata_request(id, field).await?;
        Self::handle_response(resp).await
    }

    async fn metadata_request(
        &self,
        id: u64,
        field: &str,
    ) -> Result<reqwest::Response, ClientError> {
        self.http
            .get(self.url(id))
            .bearer_auth(&self.key)
            .query(&[("query", field), ("time_format", self.time_format.as_str())])
            .send()
            .await
            .map_err(ClientError::Request)
    }

    /// Whether a record with this id exists.
    pub async fn exists(&self, id: u64) -> Result<bool, ClientError> {
        let resp = self.metadata_request(id, "exists").await?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(Self::server_error(resp).await),
        }
    }

    pub async fn sha256sum(&self, id: u64) -> Result<String, ClientError> {
        self.metadata(id, "sha256sum").await
    }

    /// File size in bytes.
    pub async fn size(&self, id: u64) -> Result<u64, ClientError> {
        parse_text(&self.metadata(id, "size").await?)
    }

    /// Reference count.
    pub async fn hardlinks(&self, id: u64) -> Result<u32, ClientError> {
        parse_text(&self.metadata(id, "hardlinks").await?)
    }

    pub async fn mimetype(&self, id: u64) -> Result<String, ClientError> {
        self.metadata(id, "mimetype").await
    }

    /// Number of data reads.
    pub async fn accessed(&self, id: u64) -> Result<u64, ClientError> {
        parse_text(&self.metadata(id, "accessed").await?)
    }

    /// Time of the last data read, `None` if never read.
    pub async fn last_access(&self, id: u64) -> Result<Option<NaiveDateTime>, ClientError> {
        let text = self.metadata(id, "last_access").await?;
        if text == "never" {
            return Ok(None);
        }
        parse_time(&text, &self.time_format).map(Some)
    }

    pub async fn created(&self, id: u64) -> Result<NaiveDateTime, ClientError> {
        parse_time(&self.metadata(id, "created").await?, &self.time_format)
    }

    /// Return the body text on success, or a [`ClientError`] on failure.
    async fn handle_response(resp: reqwest::Response) -> Result<String, ClientError> {
        if resp.status().is_success() {
            resp.text().await.map_err(ClientError::Request)
        } else {
            Err(Self::server_error(resp).await)
        }
    }

    async fn server_error(resp: reqwest::Response) -> ClientError {
        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return ClientError::Request(e),
        };
        // Try to extract error message from JSON body
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(String::from))
            .unwrap_or(body);
        ClientError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

fn parse_text<T: std::str::FromStr>(text: &str) -> Result<T, ClientError> {
    text.trim()
        .parse()
        .map_err(|_| ClientError::Protocol(format!("Unexpected response: {text:?}")))
}

fn parse_time(text: &str, time_format: &str) -> Result<NaiveDateTime, ClientError> {
    NaiveDateTime::parse_from_str(text.trim(), time_format)
        .map_err(|e| ClientError::Protocol(format!("Invalid timestamp {text:?}: {e}")))
}

/// Errors returned by [`FileDbClient`] methods.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    Request(reqwest::Error),
    /// The server returned a non-2xx HTTP status.
    Server { status: u16, message: String },
    /// The response body could not be interpreted.
    Protocol(String),
    /// Refused to upload zero bytes.
    EmptyFile,
}

impl ClientError {
    /// Returns `true` if the error is an HTTP 404 Not Found response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status: 404, .. })
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Request(e) => write!(f, "HTTP request failed: {e}"),
            ClientError::Server { status, message } => {
                write!(f, "Server error (HTTP {status}): {message}")
            }
            ClientError::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            ClientError::EmptyFile => write!(f, "Refusing to add empty file"),
        }
    }
}

impl std::error::Error for ClientError {}
