//! MIME type sniffing from leading magic bytes.

/// Fallback for binary content that matches no known signature.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// `(offset, signature, mimetype)`, checked in order.
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"II*\x00", "image/tiff"),
    (0, b"MM\x00*", "image/tiff"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"\xfd7zXZ\x00", "application/x-xz"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"\x7fELF", "application/x-executable"),
    (0, b"OggS", "audio/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"\x1a\x45\xdf\xa3", "video/webm"),
    (4, b"ftyp", "video/mp4"),
    (0, b"<?xml", "text/xml"),
    (0, b"{\\rtf", "text/rtf"),
];

/// Guess the MIME type of `data` from its content.
///
/// RIFF containers are resolved by their form type. Unrecognized valid UTF-8
/// is `text/plain`, anything else is [`OCTET_STREAM`].
pub fn sniff(data: &[u8]) -> &'static str {
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        match &data[8..12] {
            b"WEBP" => return "image/webp",
            b"WAVE" => return "audio/wav",
            b"AVI " => return "video/x-msvideo",
            _ => {}
        }
    }

    for &(offset, signature, mimetype) in SIGNATURES {
        if data.len() >= offset + signature.len()
            && &data[offset..offset + signature.len()] == signature
        {
            return mimetype;
        }
    }

    if looks_like_html(data) {
        return "text/html";
    }
    if std::str::from_utf8(data).is_ok() {
        return "text/plain";
    }
    OCTET_STREAM
}

fn looks_like_html(data: &[u8]) -> bool {
    let head = &data[..data.len().min(64)];
    let trimmed = head.trim_ascii_start();
    let lower = trimmed.to_ascii_lowercase();
    lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html")
}
