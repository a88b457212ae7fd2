//! Small helpers shared across modules.

use std::borrow::Cow;
use std::path::Path;

use tokio::io::AsyncWriteExt;

/// Expand a leading `~` to `$HOME`.
///
/// - `"~"` → `"/home/user"`
/// - `"~/foo"` → `"/home/user/foo"`
/// - Anything else passes through unchanged.
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            if path == "~" {
                return Cow::Owned(home);
            }
            return Cow::Owned(format!("{}{}", home, &path[1..]));
        }
    }
    Cow::Borrowed(path)
}

/// Write `bytes` to `path` atomically: write a sibling temp file, fsync,
/// optionally chmod, then rename over the target.
///
/// On the same filesystem readers never observe a partially-written file.
pub async fn write_atomic(path: &Path, bytes: &[u8], mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Uniquifies temp names across concurrent writes.
    static WRITE_COUNTER: AtomicU64 = AtomicU64::new(0);

    let parent = path.parent().unwrap_or(Path::new("/"));
    let seq = WRITE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = parent.join(format!(".filedb_tmp_{}_{}", std::process::id(), seq));

    let result = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        if let Some(mode) = mode {
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode)).await?;
        }
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result
}
