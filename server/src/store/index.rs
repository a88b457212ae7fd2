//! Persistent metadata index.
//!
//! The whole index is one JSON document at `$DATA_DIR/index.json`, always
//! rewritten with [`write_atomic`], so a crash leaves either the old or the new
//! index on disk, never a torn one.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::util::write_atomic;

/// Index format version, bumped on incompatible layout changes.
pub const INDEX_VERSION: u32 = 1;

/// Metadata for one stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub mimetype: String,
    pub sha256sum: String,
    /// Size in bytes.
    pub size: u64,
    /// Number of references held by clients.
    pub hardlinks: u32,
    pub created: DateTime<Local>,
    pub last_access: Option<DateTime<Local>>,
    /// Number of data reads.
    pub accessed: u64,
}

impl FileRecord {
    /// Count a data read.
    pub fn touch(&mut self) {
        self.accessed += 1;
        self.last_access = Some(Local::now());
    }
}

/// On-disk representation.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    v: u32,
    next_id: u64,
    files: Vec<FileRecord>,
}

/// In-memory index with a checksum lookup table.
#[derive(Debug, Clone)]
pub struct Index {
    next_id: u64,
    files: BTreeMap<u64, FileRecord>,
    by_checksum: HashMap<String, u64>,
}

impl Index {
    /// Load the index from `path`. A missing file yields an empty index.
    pub async fn load(path: &Path) -> Result<Self, String> {
        let content = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(format!("Failed to read index {}: {e}", path.display())),
        };
        let file: IndexFile = serde_json::from_slice(&content)
            .map_err(|e| format!("Failed to parse index {}: {e}", path.display()))?;
        if file.v > INDEX_VERSION {
            return Err(format!(
                "Index {} has version {}, newest supported is {INDEX_VERSION}",
                path.display(),
                file.v
            ));
        }

        let mut index = Self::new();
        index.next_id = file.next_id;
        for record in file.files {
            if let Some(other) = index.by_checksum.get(&record.sha256sum) {
                return Err(format!(
                    "Index {} is inconsistent: records {} and {} share checksum {}",
                    path.display(),
                    other,
                    record.id,
                    record.sha256sum
                ));
            }
            index.next_id = index.next_id.max(record.id + 1);
            index.insert(record);
        }
        Ok(index)
    }

    pub fn new() -> Self {
        Self {
            next_id: 1,
            files: BTreeMap::new(),
            by_checksum: HashMap::new(),
        }
    }

    /// Write the index atomically to `path`.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        let file = IndexFile {
            v: INDEX_VERSION,
            next_id: self.next_id,
            files: self.files.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(std::io::Error::other)?;
        write_atomic(path, &json, None).await
    }

    /// Reserve the next record id.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.by_checksum.insert(record.sha256sum.clone(), record.id);
        self.files.insert(record.id, record);
    }

    pub fn remove(&mut self, id: u64) -> Option<FileRecord> {
        let record = self.files.remove(&id)?;
        self.by_checksum.remove(&record.sha256sum);
        Some(record)
    }

    pub fn get(&self, id: u64) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut FileRecord> {
        self.files.get_mut(&id)
    }

    pub fn id_by_checksum(&self, sha256sum: &str) -> Option<u64> {
        self.by_checksum.get(sha256sum).copied()
    }

    /// Records ordered by id.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}
