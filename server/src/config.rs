//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables**: `FILEDB_LISTEN`, `FILEDB_DATA_DIR`,
//!    `FILEDB_TIME_FORMAT`
//! 2. **Config file**: path via `--config <path>`, or `filedb.toml` in CWD
//! 3. **Compiled defaults**: see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! max_file_size = 67108864  # 64 MB
//!
//! [storage]
//! data_dir = "/var/lib/filedb"
//! mode = "0644"
//! access_flush_secs = 30    # persist download counters at most this late
//!
//! [data]
//! time_format = "%Y-%m-%dT%H:%M:%S"
//!
//! [logging]
//! level = "info"
//!
//! [[permissions]]
//! key = "0b5e2c8a-4d7f-4f1e-9d38-6c2a1f0e7b55"
//! get = true
//! post = true
//! delete = false
//! annotation = "image service"
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::util::expand_tilde;

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "filedb.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Keys allowed to access the file database.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `127.0.0.1:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum accepted upload size in bytes (default 64 MB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

/// On-disk storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `index.json` and the `blobs/` tree. Default `/var/lib/filedb`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Octal permission string applied to new blobs (default `"0644"`).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Interval in seconds for writing `accessed`/`last_access` counters to the
    /// index (default 30, minimum 1). Counters are also written with every
    /// other index change and on shutdown.
    #[serde(default = "default_access_flush_secs")]
    pub access_flush_secs: u64,
}

/// Data presentation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// `strftime` format for `created` / `last_access` metadata queries.
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// An access key and the HTTP methods it may use.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub key: String,
    /// Allows `GET`.
    #[serde(default)]
    pub get: bool,
    /// Allows `POST` and `PUT`.
    #[serde(default)]
    pub post: bool,
    /// Allows `DELETE`.
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub annotation: String,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{}{} ({})",
            self.key,
            if self.get { 'g' } else { '-' },
            if self.post { 'p' } else { '-' },
            if self.delete { 'd' } else { '-' },
            self.annotation
        )
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_max_file_size() -> usize {
    64 * 1024 * 1024 // 64 MB
}
fn default_data_dir() -> String {
    "/var/lib/filedb".to_string()
}
fn default_mode() -> String {
    "0644".to_string()
}
fn default_access_flush_secs() -> u64 {
    30
}
fn default_time_format() -> String {
    "%Y-%m-%dT%H:%M:%S".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            mode: default_mode(),
            access_flush_secs: default_access_flush_secs(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl StorageConfig {
    /// Parse [`StorageConfig::mode`] as an octal permission value.
    pub fn file_mode(&self) -> Result<u32, String> {
        u32::from_str_radix(self.mode.trim_start_matches("0o"), 8)
            .map_err(|_| format!("Invalid octal mode: {:?}", self.mode))
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist and parse. Otherwise looks for
    /// `filedb.toml` in the current directory, falling back to compiled defaults.
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        let mut config = if let Some(p) = path {
            Self::from_file(Path::new(p))?
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("FILEDB_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(dir) = std::env::var("FILEDB_DATA_DIR") {
            config.storage.data_dir = dir;
        }
        if let Ok(fmt) = std::env::var("FILEDB_TIME_FORMAT") {
            config.data.time_format = fmt;
        }

        config.storage.data_dir = expand_tilde(&config.storage.data_dir).into_owned();
        config.storage.file_mode()?;
        config.storage.access_flush_secs = config.storage.access_flush_secs.max(1);
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        Self::from_toml(&content)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))
    }

    /// Parse a TOML document, filling in defaults for absent sections.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Look up the permission entry for an access key.
    pub fn permission(&self, key: &str) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| crate::auth::constant_time_eq(p.key.as_bytes(), key.as_bytes()))
    }
}
