//! Streaming SHA-256 hashing utilities.
//!
//! File hashing streams data in 64 KiB blocks and never loads a blob into memory.

use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Compute SHA-256 of an entire file by streaming. Returns lowercase hex string.
pub async fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute SHA-256 of a byte slice. Returns lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Whether `s` looks like a SHA-256 hex digest (64 lowercase hex chars).
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().fold(
            String::with_capacity(bytes.as_ref().len() * 2),
            |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{b:02x}");
                s
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_hash_bytes_known_vector() {
        assert_eq!(hash_bytes(b"hello"), HELLO_SHA256);
    }

    #[tokio::test]
    async fn test_hash_file_matches_hash_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        // Larger than one buffer so the loop runs more than once.
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(hash_file(&path).await.unwrap(), hash_bytes(&data));
    }

    #[test]
    fn test_is_sha256_hex() {
        assert!(is_sha256_hex(HELLO_SHA256));
        assert!(!is_sha256_hex(&HELLO_SHA256.to_uppercase()));
        assert!(!is_sha256_hex("2cf24d"));
        assert!(!is_sha256_hex(&"g".repeat(64)));
    }
}
