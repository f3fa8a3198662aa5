//! Key and range helpers shared by every store.

use std::ops::Bound;

use crate::error::{DbError, Result};

/// Reject ranges whose start sorts after their end.
pub fn check_range(start: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(DbError::InvalidArgument(format!(
                "range start {:?} is after end {:?}",
                s, e
            )));
        }
    }
    Ok(())
}

/// Convert an optional `[start, end)` pair into map bounds.
pub fn bounds<'a>(
    start: Option<&'a [u8]>,
    end: Option<&'a [u8]>,
) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    let lo = start.map_or(Bound::Unbounded, Bound::Included);
    let hi = end.map_or(Bound::Unbounded, Bound::Excluded);
    (lo, hi)
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists, i.e. the prefix is empty or made
/// only of `0xFF` bytes; the prefixed key space then extends to the end.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Whether `key` falls inside the half-open range `[start, end)`.
pub fn in_domain(key: &[u8], start: Option<&[u8]>, end: Option<&[u8]>) -> bool {
    if start.is_some_and(|s| key < s) {
        return false;
    }
    if end.is_some_and(|e| key >= e) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_rejected() {
        assert!(check_range(Some(b"b".as_slice()), Some(b"a".as_slice())).is_err());
        assert!(check_range(Some(b"a".as_slice()), Some(b"a".as_slice())).is_ok());
        assert!(check_range(None, Some(b"a".as_slice())).is_ok());
        assert!(check_range(Some(b"z".as_slice()), None).is_ok());
    }

    #[test]
    fn prefix_end_increments_last_byte() {
        assert_eq!(prefix_end(b"a:"), Some(b"a;".to_vec()));
        assert_eq!(prefix_end(&[1, 0xFF]), Some(vec![2]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_end(b""), None);
    }

    #[test]
    fn domain_is_half_open() {
        assert!(in_domain(b"a", Some(b"a".as_slice()), Some(b"b".as_slice())));
        assert!(!in_domain(b"b", Some(b"a".as_slice()), Some(b"b".as_slice())));
        assert!(!in_domain(b"", Some(b"a".as_slice()), None));
        assert!(in_domain(b"", None, None));
    }
}
