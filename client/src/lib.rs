//! # filedb-client
//!
//! Typed HTTP access to a filedb server.
//!
//! ```no_run
//! # async fn demo() -> Result<(), filedb_client::ClientError> {
//! let client = filedb_client::FileDbClient::new("http://127.0.0.1:8080/filedb", "my-key")?;
//! let id = client.add(b"hello".to_vec()).await?;
//! assert_eq!(client.get(id, false).await?, b"hello");
//! assert_eq!(client.size(id).await?, 5);
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{ClientError, FileDbClient, DEFAULT_TIME_FORMAT};
