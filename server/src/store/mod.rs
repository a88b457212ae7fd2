//! Content-addressed file store.
//!
//! Blobs live at `$DATA_DIR/blobs/<sha256>`, metadata in `$DATA_DIR/index.json`.
//! Identical content is stored once. Each additional upload of the same bytes
//! bumps the record's `hardlinks` counter instead of writing a new blob, and
//! [`FileStore::unlink`] only removes the blob once the counter drops to zero.
//!
//! Mutations run under a single write lock. Each one is applied to a copy of
//! the index, and the copy replaces the live index only after it has been
//! written to disk, so a failed save leaves memory and disk in agreement.
//!
//! Data reads only bump `accessed`/`last_access` in memory. Those counters
//! reach disk with the next mutation or the next [`FileStore::flush`].

pub mod hasher;
pub mod index;
pub mod mime;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub use index::FileRecord;
use index::Index;

const INDEX_FILE: &str = "index.json";
const BLOB_DIR: &str = "blobs";

/// Selects a record either by id or by content checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ident {
    Id(u64),
    Checksum(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Id(id) => write!(f, "#{id}"),
            Ident::Checksum(sum) => write!(f, "{sum}"),
        }
    }
}

/// Errors returned by [`FileStore`] operations.
#[derive(Debug)]
pub enum StoreError {
    /// No record matches the identifier.
    NotFound(Ident),
    /// Refusing to store zero bytes.
    EmptyFile,
    /// Upload exceeds the configured maximum.
    TooLarge { size: usize, max: usize },
    /// Blob content no longer matches the recorded checksum.
    ChecksumMismatch { expected: String, actual: String },
    /// The record exists but its blob is gone from disk.
    BlobMissing(PathBuf),
    /// Filesystem failure.
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(ident) => write!(f, "No such file: {ident}"),
            StoreError::EmptyFile => write!(f, "Refusing to create empty file"),
            StoreError::TooLarge { size, max } => {
                write!(f, "File too large ({size} bytes, max {max})")
            }
            StoreError::ChecksumMismatch { expected, actual } => write!(
                f,
                "File checksums do not match (expected {expected}, actual {actual})"
            ),
            StoreError::BlobMissing(path) => write!(f, "Blob missing: {}", path.display()),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Result of [`FileStore::unlink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlinkOutcome {
    pub id: u64,
    /// Remaining references (0 once removed).
    pub hardlinks: u32,
    /// Whether the record was deleted.
    pub removed: bool,
    /// Whether a blob was deleted from disk. `false` if it was already gone.
    pub blob_removed: bool,
}

/// Consistency state of one record, see [`FileStore::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consistency {
    Ok,
    Missing,
    Corrupted { actual: String },
}

/// Aggregate numbers for health reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub files: usize,
    pub bytes: u64,
}

/// The file database: blob directory plus metadata index.
pub struct FileStore {
    blob_dir: PathBuf,
    index_path: PathBuf,
    mode: u32,
    max_file_size: usize,
    index: RwLock<Index>,
    /// Set when access counters changed since the index was last written.
    access_dirty: AtomicBool,
}

impl FileStore {
    /// Open (or initialize) a store rooted at `data_dir`.
    ///
    /// `mode` is applied to every new blob. Uploads larger than
    /// `max_file_size` are rejected by [`FileStore::add`].
    pub async fn open(data_dir: &Path, mode: u32, max_file_size: usize) -> Result<Self, String> {
        let blob_dir = data_dir.join(BLOB_DIR);
        tokio::fs::create_dir_all(&blob_dir)
            .await
            .map_err(|e| format!("Failed to create {}: {e}", blob_dir.display()))?;
        let index_path = data_dir.join(INDEX_FILE);
        let index = Index::load(&index_path).await?;
        info!(
            "Opened file store at {} ({} records)",
            data_dir.display(),
            index.len()
        );
        Ok(Self {
            blob_dir,
            index_path,
            mode,
            max_file_size,
            index: RwLock::new(index),
            access_dirty: AtomicBool::new(false),
        })
    }

    /// Path of the blob for a checksum.
    pub fn blob_path(&self, sha256sum: &str) -> PathBuf {
        self.blob_dir.join(sha256sum)
    }

    /// Apply `change` to a copy of `index`, persist the copy, then swap it in.
    ///
    /// On any error the live index is left untouched.
    async fn commit<T>(
        &self,
        index: &mut Index,
        change: impl FnOnce(&mut Index) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = index.clone();
        let out = change(&mut next)?;
        next.save(&self.index_path).await?;
        *index = next;
        self.access_dirty.store(false, Ordering::Relaxed);
        Ok(out)
    }

    /// Store `data`, deduplicating by SHA-256.
    ///
    /// Known content gets its reference counter bumped, and its blob is
    /// rewritten if it went missing from disk.
    pub async fn add(&self, data: &[u8]) -> Result<FileRecord, StoreError> {
        if data.is_empty() {
            return Err(StoreError::EmptyFile);
        }
        if data.len() > self.max_file_size {
            return Err(StoreError::TooLarge {
                size: data.len(),
                max: self.max_file_size,
            });
        }

        let sha256sum = hasher::hash_bytes(data);
        let path = self.blob_path(&sha256sum);
        let mut index = self.index.write().await;

        if let Some(id) = index.id_by_checksum(&sha256sum) {
            if !tokio::fs::try_exists(&path).await? {
                warn!("Blob of #{id} missing on disk, restoring {}", path.display());
                crate::util::write_atomic(&path, data, Some(self.mode)).await?;
            }
            let record = self
                .commit(&mut index, |next| {
                    let record = next
                        .get_mut(id)
                        .ok_or(StoreError::NotFound(Ident::Id(id)))?;
                    record.hardlinks = record.hardlinks.saturating_add(1);
                    Ok(record.clone())
                })
                .await?;
            debug!("Linked existing #{} (hardlinks={})", record.id, record.hardlinks);
            return Ok(record);
        }

        crate::util::write_atomic(&path, data, Some(self.mode)).await?;
        let mimetype = mime::sniff(data).to_string();
        let size = data.len() as u64;
        let committed = self
            .commit(&mut index, |next| {
                let record = FileRecord {
                    id: next.allocate_id(),
                    mimetype,
                    sha256sum,
                    size,
                    hardlinks: 1,
                    created: Local::now(),
                    last_access: None,
                    accessed: 0,
                };
                next.insert(record.clone());
                Ok(record)
            })
            .await;
        let record = match committed {
            Ok(record) => record,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };
        info!(
            "Added #{} ({} bytes, {})",
            record.id, record.size, record.mimetype
        );
        Ok(record)
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: u64) -> Result<FileRecord, StoreError> {
        self.index
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(Ident::Id(id)))
    }

    /// Fetch a record by checksum.
    pub async fn by_checksum(&self, sha256sum: &str) -> Result<FileRecord, StoreError> {
        let index = self.index.read().await;
        index
            .id_by_checksum(sha256sum)
            .and_then(|id| index.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(Ident::Checksum(sha256sum.to_string())))
    }

    /// Fetch a record by either identifier kind.
    pub async fn resolve(&self, ident: &Ident) -> Result<FileRecord, StoreError> {
        match ident {
            Ident::Id(id) => self.get(*id).await,
            Ident::Checksum(sum) => self.by_checksum(sum).await,
        }
    }

    /// Prepare a data read: count the access and locate the blob.
    ///
    /// The access is recorded in memory only. With `verify` the blob is
    /// re-hashed and a mismatch is an error.
    pub async fn open_data(
        &self,
        id: u64,
        verify: bool,
    ) -> Result<(FileRecord, PathBuf), StoreError> {
        let record = {
            let mut index = self.index.write().await;
            let record = index
                .get_mut(id)
                .ok_or(StoreError::NotFound(Ident::Id(id)))?;
            record.touch();
            self.access_dirty.store(true, Ordering::Relaxed);
            record.clone()
        };

        let path = self.blob_path(&record.sha256sum);
        if verify {
            let actual = match hasher::hash_file(&path).await {
                Ok(sum) => sum,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StoreError::BlobMissing(path));
                }
                Err(e) => return Err(e.into()),
            };
            if actual != record.sha256sum {
                warn!("Checksum mismatch on #{}: {actual}", record.id);
                return Err(StoreError::ChecksumMismatch {
                    expected: record.sha256sum,
                    actual,
                });
            }
        } else if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::BlobMissing(path));
        }
        Ok((record, path))
    }

    /// Write pending access counters to disk. Returns whether a write happened.
    pub async fn flush(&self) -> Result<bool, StoreError> {
        let index = self.index.read().await;
        if !self.access_dirty.swap(false, Ordering::Relaxed) {
            return Ok(false);
        }
        if let Err(e) = index.save(&self.index_path).await {
            self.access_dirty.store(true, Ordering::Relaxed);
            return Err(e.into());
        }
        debug!("Flushed access counters");
        Ok(true)
    }

    /// Add a reference to an existing record.
    pub async fn link(&self, id: u64) -> Result<FileRecord, StoreError> {
        let mut index = self.index.write().await;
        self.commit(&mut index, |next| {
            let record = next
                .get_mut(id)
                .ok_or(StoreError::NotFound(Ident::Id(id)))?;
            record.hardlinks = record.hardlinks.saturating_add(1);
            Ok(record.clone())
        })
        .await
    }

    /// Drop a reference. The record and blob are removed once no references
    /// remain, or immediately when `force` is set.
    pub async fn unlink(&self, id: u64, force: bool) -> Result<UnlinkOutcome, StoreError> {
        let mut index = self.index.write().await;
        let outcome = self
            .commit(&mut index, |next| {
                let record = next
                    .get_mut(id)
                    .ok_or(StoreError::NotFound(Ident::Id(id)))?;
                record.hardlinks = record.hardlinks.saturating_sub(1);
                if record.hardlinks > 0 && !force {
                    return Ok((record.hardlinks, None));
                }
                Ok((0, next.remove(id)))
            })
            .await?;

        match outcome {
            (hardlinks, None) => Ok(UnlinkOutcome {
                id,
                hardlinks,
                removed: false,
                blob_removed: false,
            }),
            (_, Some(record)) => {
                let blob_removed = self.remove_blob(&record).await;
                info!("Removed #{id} ({})", record.sha256sum);
                Ok(UnlinkOutcome {
                    id,
                    hardlinks: 0,
                    removed: true,
                    blob_removed,
                })
            }
        }
    }

    /// Delete a record and its blob regardless of references.
    pub async fn purge(&self, ident: &Ident) -> Result<FileRecord, StoreError> {
        let record = self.untrack(ident).await?;
        self.remove_blob(&record).await;
        Ok(record)
    }

    /// Delete a record but leave its blob on disk.
    pub async fn untrack(&self, ident: &Ident) -> Result<FileRecord, StoreError> {
        let mut index = self.index.write().await;
        let record = self
            .commit(&mut index, |next| {
                let id = match ident {
                    Ident::Id(id) => Some(*id),
                    Ident::Checksum(sum) => next.id_by_checksum(sum),
                };
                id.and_then(|id| next.remove(id))
                    .ok_or_else(|| StoreError::NotFound(ident.clone()))
            })
            .await?;
        info!("Untracked #{} ({})", record.id, record.sha256sum);
        Ok(record)
    }

    /// Overwrite the reference counter of a record.
    pub async fn set_hardlinks(&self, id: u64, hardlinks: u32) -> Result<FileRecord, StoreError> {
        let mut index = self.index.write().await;
        self.commit(&mut index, |next| {
            let record = next
                .get_mut(id)
                .ok_or(StoreError::NotFound(Ident::Id(id)))?;
            record.hardlinks = hardlinks;
            Ok(record.clone())
        })
        .await
    }

    /// All records ordered by id.
    pub async fn list(&self) -> Vec<FileRecord> {
        self.index.read().await.records().cloned().collect()
    }

    /// All records ordered by size, largest first.
    pub async fn top(&self) -> Vec<FileRecord> {
        let mut records = self.list().await;
        records.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));
        records
    }

    /// Verify every blob against its recorded checksum.
    pub async fn check(&self) -> Result<Vec<(FileRecord, Consistency)>, StoreError> {
        let records = self.list().await;
        let mut report = Vec::with_capacity(records.len());
        for record in records {
            let state = match hasher::hash_file(&self.blob_path(&record.sha256sum)).await {
                Ok(actual) if actual == record.sha256sum => Consistency::Ok,
                Ok(actual) => Consistency::Corrupted { actual },
                Err(e) if e.kind() == io::ErrorKind::NotFound => Consistency::Missing,
                Err(e) => return Err(e.into()),
            };
            report.push((record, state));
        }
        Ok(report)
    }

    pub async fn stats(&self) -> StoreStats {
        let index = self.index.read().await;
        StoreStats {
            files: index.len(),
            bytes: index.records().map(|r| r.size).sum(),
        }
    }

    async fn remove_blob(&self, record: &FileRecord) -> bool {
        let path = self.blob_path(&record.sha256sum);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Could not delete {} - does not exist", path.display());
                false
            }
            Err(e) => {
                warn!("Could not delete {}: {e}", path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    async fn open_store(dir: &Path) -> FileStore {
        FileStore::open(dir, 0o640, 1024).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        let first = store.add(b"hello").await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.hardlinks, 1);
        assert_eq!(first.size, 5);
        assert_eq!(first.mimetype, "text/plain");

        let second = store.add(b"hello").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.hardlinks, 2);

        let other = store.add(b"world").await.unwrap();
        assert_eq!(other.id, 2);
        assert_eq!(store.stats().await.files, 2);

        let blob = store.blob_path(&first.sha256sum);
        assert_eq!(std::fs::read(&blob).unwrap(), b"hello");
        let mode = std::fs::metadata(&blob).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[tokio::test]
    async fn test_add_rejects_empty_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        assert!(matches!(store.add(b"").await, Err(StoreError::EmptyFile)));
        assert!(matches!(
            store.add(&[0u8; 2048]).await,
            Err(StoreError::TooLarge { size: 2048, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_add_restores_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"restore me").await.unwrap();
        let blob = store.blob_path(&record.sha256sum);
        std::fs::remove_file(&blob).unwrap();

        store.add(b"restore me").await.unwrap();
        assert_eq!(std::fs::read(&blob).unwrap(), b"restore me");
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = open_store(dir.path()).await;
            store.add(b"persisted").await.unwrap().id
        };
        let store = open_store(dir.path()).await;
        let record = store.get(id).await.unwrap();
        assert_eq!(record.size, 9);
        let by_sum = store.by_checksum(&record.sha256sum).await.unwrap();
        assert_eq!(by_sum.id, id);
    }

    #[tokio::test]
    async fn test_open_data_touches_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"payload").await.unwrap();

        let (touched, path) = store.open_data(record.id, true).await.unwrap();
        assert_eq!(touched.accessed, 1);
        assert!(touched.last_access.is_some());
        assert_eq!(std::fs::read(path).unwrap(), b"payload");

        // Corrupt the blob: verified reads fail, unverified reads go through.
        std::fs::write(store.blob_path(&record.sha256sum), b"tampered").unwrap();
        assert!(matches!(
            store.open_data(record.id, true).await,
            Err(StoreError::ChecksumMismatch { .. })
        ));
        let (touched, _) = store.open_data(record.id, false).await.unwrap();
        assert_eq!(touched.accessed, 3);

        std::fs::remove_file(store.blob_path(&record.sha256sum)).unwrap();
        assert!(matches!(
            store.open_data(record.id, false).await,
            Err(StoreError::BlobMissing(_))
        ));
        assert!(matches!(
            store.open_data(99, true).await,
            Err(StoreError::NotFound(Ident::Id(99)))
        ));
    }

    #[tokio::test]
    async fn test_link_and_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"shared").await.unwrap();
        assert_eq!(store.link(record.id).await.unwrap().hardlinks, 2);

        let outcome = store.unlink(record.id, false).await.unwrap();
        assert!(!outcome.removed);
        assert_eq!(outcome.hardlinks, 1);
        assert!(store.blob_path(&record.sha256sum).exists());

        let outcome = store.unlink(record.id, false).await.unwrap();
        assert!(outcome.removed);
        assert!(outcome.blob_removed);
        assert!(!store.blob_path(&record.sha256sum).exists());
        assert!(matches!(
            store.get(record.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_forced_unlink_with_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"gone").await.unwrap();
        store.link(record.id).await.unwrap();
        std::fs::remove_file(store.blob_path(&record.sha256sum)).unwrap();

        let outcome = store.unlink(record.id, true).await.unwrap();
        assert!(outcome.removed);
        assert!(!outcome.blob_removed);
    }

    /// Replace `index.json` with a non-empty directory so the next save fails.
    fn block_index_writes(dir: &Path) {
        let index = dir.join(INDEX_FILE);
        let _ = std::fs::remove_file(&index);
        std::fs::create_dir_all(index.join("occupied")).unwrap();
    }

    fn unblock_index_writes(dir: &Path) {
        std::fs::remove_dir_all(dir.join(INDEX_FILE)).unwrap();
    }

    #[tokio::test]
    async fn test_failed_save_leaves_index_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"stable").await.unwrap();
        block_index_writes(dir.path());

        assert!(store.link(record.id).await.is_err());
        assert_eq!(store.get(record.id).await.unwrap().hardlinks, 1);
        assert!(store.add(b"stable").await.is_err());
        assert_eq!(store.get(record.id).await.unwrap().hardlinks, 1);
        assert!(store.set_hardlinks(record.id, 9).await.is_err());
        assert_eq!(store.get(record.id).await.unwrap().hardlinks, 1);

        assert!(store.unlink(record.id, true).await.is_err());
        assert_eq!(store.get(record.id).await.unwrap(), record);
        assert!(store.blob_path(&record.sha256sum).exists());
        assert!(store.untrack(&Ident::Id(record.id)).await.is_err());
        assert!(store.get(record.id).await.is_ok());

        let fresh = store.add(b"never stored").await;
        assert!(fresh.is_err());
        assert_eq!(store.stats().await.files, 1);
        assert!(!store
            .blob_path(&hasher::hash_bytes(b"never stored"))
            .exists());

        unblock_index_writes(dir.path());
        assert_eq!(store.link(record.id).await.unwrap().hardlinks, 2);
        assert_eq!(store.add(b"next").await.unwrap().id, record.id + 1);
    }

    #[tokio::test]
    async fn test_access_counters_are_flushed_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"counted").await.unwrap();
        assert!(!store.flush().await.unwrap());

        store.open_data(record.id, false).await.unwrap();
        store.open_data(record.id, false).await.unwrap();
        assert_eq!(
            open_store(dir.path()).await.get(record.id).await.unwrap().accessed,
            0
        );

        assert!(store.flush().await.unwrap());
        assert!(!store.flush().await.unwrap());
        let reopened = open_store(dir.path()).await.get(record.id).await.unwrap();
        assert_eq!(reopened.accessed, 2);
        assert!(reopened.last_access.is_some());

        // Any index write carries pending counters along.
        store.open_data(record.id, false).await.unwrap();
        store.link(record.id).await.unwrap();
        assert!(!store.flush().await.unwrap());
        let reopened = open_store(dir.path()).await.get(record.id).await.unwrap();
        assert_eq!(reopened.accessed, 3);
    }

    #[tokio::test]
    async fn test_failed_flush_stays_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"pending").await.unwrap();
        store.open_data(record.id, false).await.unwrap();

        block_index_writes(dir.path());
        assert!(store.flush().await.is_err());
        unblock_index_writes(dir.path());
        assert!(store.flush().await.unwrap());
    }

    #[tokio::test]
    async fn test_reference_counter_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let record = store.add(b"popular").await.unwrap();
        store.set_hardlinks(record.id, u32::MAX).await.unwrap();
        assert_eq!(store.link(record.id).await.unwrap().hardlinks, u32::MAX);
        assert_eq!(store.add(b"popular").await.unwrap().hardlinks, u32::MAX);
    }

    #[tokio::test]
    async fn test_purge_and_untrack() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let a = store.add(b"purge me").await.unwrap();
        let b = store.add(b"untrack me").await.unwrap();

        store.purge(&Ident::Id(a.id)).await.unwrap();
        assert!(!store.blob_path(&a.sha256sum).exists());

        store
            .untrack(&Ident::Checksum(b.sha256sum.clone()))
            .await
            .unwrap();
        assert!(store.blob_path(&b.sha256sum).exists());
        assert_eq!(store.stats().await.files, 0);

        assert!(matches!(
            store.purge(&Ident::Id(a.id)).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_top_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let small = store.add(b"a").await.unwrap();
        let big = store.add(b"abcdef").await.unwrap();
        let mid = store.add(b"abc").await.unwrap();

        let ids: Vec<u64> = store.top().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![big.id, mid.id, small.id]);

        std::fs::remove_file(store.blob_path(&small.sha256sum)).unwrap();
        std::fs::write(store.blob_path(&big.sha256sum), b"changed").unwrap();
        let report = store.check().await.unwrap();
        let states: Vec<_> = report.iter().map(|(r, s)| (r.id, s.clone())).collect();
        assert_eq!(states[0], (small.id, Consistency::Missing));
        assert!(matches!(states[1].1, Consistency::Corrupted { .. }));
        assert_eq!(states[2], (mid.id, Consistency::Ok));
    }
}
