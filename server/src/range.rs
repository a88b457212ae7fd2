//! HTTP `Range` handling for blob downloads.
//!
//! Only the first range of a `bytes=` header is honoured. A start offset at
//! or past the end of the blob restarts at 0 rather than failing, and the end
//! offset is inclusive and clamped to the last byte. A suffix range
//! (`bytes=-N`) selects the last `N` bytes.

/// A resolved, inclusive byte range within a blob of `size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub size: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.size)
    }
}

/// Parse a `Range` header value against a blob of `size` bytes.
///
/// Returns `None` when the header carries no usable range or the blob is
/// empty, in which case the full content should be served.
pub fn parse_range(header: &str, size: u64) -> Option<ByteRange> {
    if size == 0 {
        return None;
    }
    let spec = header.trim().strip_prefix("bytes=")?;
    let first = spec.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    let last = size - 1;

    if start.is_empty() {
        let suffix = end.parse::<u64>().ok().filter(|&n| n > 0)?;
        return Some(ByteRange {
            start: size.saturating_sub(suffix),
            end: last,
            size,
        });
    }

    let mut start = start.parse::<u64>().ok()?;
    if start >= size {
        start = 0;
    }
    let end = match end {
        "" => last,
        e => e.parse::<u64>().ok()?.min(last),
    };
    if end < start {
        return None;
    }

    Some(ByteRange { start, end, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_ended() {
        let r = parse_range("bytes=100-", 1000).unwrap();
        assert_eq!((r.start, r.end), (100, 999));
        assert_eq!(r.byte_count(), 900);
        assert_eq!(r.content_range(), "bytes 100-999/1000");
    }

    #[test]
    fn test_bounded_and_clamped() {
        let r = parse_range("bytes=0-9", 1000).unwrap();
        assert_eq!(r.byte_count(), 10);
        let r = parse_range("bytes=990-5000", 1000).unwrap();
        assert_eq!((r.start, r.end), (990, 999));
    }

    #[test]
    fn test_start_past_end_restarts() {
        let r = parse_range("bytes=2000-", 1000).unwrap();
        assert_eq!((r.start, r.end), (0, 999));
    }

    #[test]
    fn test_suffix_selects_tail() {
        let r = parse_range("bytes=-3", 10).unwrap();
        assert_eq!((r.start, r.end), (7, 9));
        assert_eq!(r.content_range(), "bytes 7-9/10");
        let r = parse_range("bytes=-500", 10).unwrap();
        assert_eq!((r.start, r.end), (0, 9));
        assert_eq!(parse_range("bytes=-0", 10), None);
        assert_eq!(parse_range("bytes=-", 10), None);
    }

    #[test]
    fn test_first_of_multiple_ranges() {
        let r = parse_range("bytes=5-9, 20-30", 100).unwrap();
        assert_eq!((r.start, r.end), (5, 9));
    }

    #[test]
    fn test_unusable_headers() {
        assert_eq!(parse_range("items=0-5", 100), None);
        assert_eq!(parse_range("bytes=abc-", 100), None);
        assert_eq!(parse_range("bytes=50-10", 100), None);
        assert_eq!(parse_range("bytes=0-", 0), None);
    }
}
