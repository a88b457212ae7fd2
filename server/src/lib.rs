#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

//! # filedb
//!
//! Content-addressed file database with a REST API.
//!
//! Files are stored once per SHA-256 checksum and reference counted. Clients
//! upload raw bytes, keep the returned integer id, and fetch the data or its
//! metadata later. Each access key carries its own get/post/delete rights.
//!
//! ## API surface
//!
//! | Method | Path              | Right    | Description                         |
//! |--------|-------------------|----------|-------------------------------------|
//! | GET    | `/health`         | none     | Liveness probe                      |
//! | POST   | `/filedb`         | `post`   | Store a file, returns its id        |
//! | GET    | `/filedb/{id}`    | `get`    | Download (Range aware) or metadata  |
//! | PUT    | `/filedb/{id}`    | `post`   | Add a reference                     |
//! | DELETE | `/filedb/{id}`    | `delete` | Drop a reference                    |
//!
//! ## Architecture
//!
//! ```text
//! main.rs         : entry point, clap subcommands, graceful shutdown
//! app.rs          : the application router (route name "filedb" → handler)
//! auth.rs         : key lookup and per-method permission middleware
//! config.rs       : TOML + env-var configuration
//! state.rs        : shared AppState
//! range.rs        : Range / Content-Range handling
//! maintenance.rs  : reference reconciliation for `filedb clean`
//! routes/
//!   filedb.rs     : the FileDB resource handler
//!   health.rs     : GET /health
//! store/
//!   mod.rs        : FileStore (dedup, reference counting, verification)
//!   index.rs      : persistent JSON metadata index
//!   hasher.rs     : streaming SHA-256
//!   mime.rs       : MIME sniffing
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod maintenance;
pub mod range;
pub mod routes;
pub mod state;
pub mod store;
pub mod util;

pub use app::{application, FILEDB_ROUTE};
pub use config::Config;
pub use state::AppState;
pub use store::{FileRecord, FileStore, Ident, StoreError};
