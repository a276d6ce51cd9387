/// Byte-range request handling
///
/// A requested range is only served when it lies entirely inside
/// `[0, size-1]`; anything else is answered with 416. Multi-range requests
/// collapse to their first range.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// The default span when no `Range` header was sent: the whole object.
pub fn full_range(size: u64) -> Option<ByteRange> {
    size.checked_sub(1).map(|end| ByteRange { start: 0, end })
}

/// Parse a `Range` header value against the object size. `None` means the
/// header is malformed or unsatisfiable; callers answer with 416.
pub fn parse_range_header(header: &str, size: u64) -> Option<ByteRange> {
    let spec = header.strip_prefix("bytes=")?;
    let spec = spec.split(',').next()?.trim();
    let (start_spec, end_spec) = spec.split_once('-')?;

    let range = if start_spec.is_empty() {
        // Suffix range: "-N" means the last N bytes.
        let suffix: u64 = end_spec.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        ByteRange {
            start: size.saturating_sub(suffix),
            end: size.checked_sub(1)?,
        }
    } else {
        let start: u64 = start_spec.parse().ok()?;
        let end: u64 = if end_spec.is_empty() {
            // Open range: "S-" runs through the end of the object.
            size.checked_sub(1)?
        } else {
            end_spec.parse().ok()?
        };
        ByteRange { start, end }
    };

    if !is_satisfiable(range, size) {
        return None;
    }

    Some(range)
}

/// Satisfiable means both endpoints fall inside the object.
pub fn is_satisfiable(range: ByteRange, size: u64) -> bool {
    range.start <= range.end && range.end < size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_range() {
        let range = parse_range_header("bytes=0-499", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 499 });
        assert_eq!(range.length(), 500);
    }

    #[test]
    fn test_open_range_runs_to_the_end() {
        let range = parse_range_header("bytes=500-", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 500, end: 999 });
    }

    #[test]
    fn test_suffix_range() {
        let range = parse_range_header("bytes=-200", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 800, end: 999 });

        // An oversized suffix starts at the beginning of the object.
        let range = parse_range_header("bytes=-5000", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 999 });
    }

    #[test]
    fn test_single_byte_ranges() {
        assert_eq!(
            parse_range_header("bytes=0-0", 1000).unwrap(),
            ByteRange { start: 0, end: 0 }
        );
        assert_eq!(
            parse_range_header("bytes=999-999", 1000).unwrap(),
            ByteRange { start: 999, end: 999 }
        );
    }

    #[test]
    fn test_out_of_bounds_is_unsatisfiable() {
        // start >= size
        assert!(parse_range_header("bytes=1000-1000", 1000).is_none());
        assert!(parse_range_header("bytes=5000-", 1000).is_none());
        // end >= size is not clamped, it is rejected
        assert!(parse_range_header("bytes=0-1000", 1000).is_none());
        // inverted
        assert!(parse_range_header("bytes=500-100", 1000).is_none());
    }

    #[test]
    fn test_malformed_headers() {
        assert!(parse_range_header("bits=0-1", 1000).is_none());
        assert!(parse_range_header("bytes=", 1000).is_none());
        assert!(parse_range_header("bytes=-", 1000).is_none());
        assert!(parse_range_header("bytes=abc-def", 1000).is_none());
        assert!(parse_range_header("bytes=-0", 1000).is_none());
    }

    #[test]
    fn test_multi_range_uses_the_first() {
        let range = parse_range_header("bytes=0-99,200-299", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 99 });
    }

    #[test]
    fn test_empty_object() {
        assert!(full_range(0).is_none());
        assert!(parse_range_header("bytes=0-0", 0).is_none());
        assert_eq!(full_range(10), Some(ByteRange { start: 0, end: 9 }));
    }
}
