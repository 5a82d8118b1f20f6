//! Migration version ordering.

use std::cmp::Ordering;

/// Compares two migration version strings segment by segment.
///
/// Segments are split on `.`; segments that are both numeric compare as
/// numbers, anything else compares lexically. A missing segment counts as
/// `0`, so `"1"` and `"1.0"` are equal.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use localsql_core::compare_versions;
///
/// assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
/// assert_eq!(compare_versions("1.0", "1"), Ordering::Equal);
/// assert_eq!(compare_versions("0.0", "1.0"), Ordering::Less);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.trim().split('.');
    let mut right = b.trim().split('.');
    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(l), None) => compare_segment(l, "0"),
            (None, Some(r)) => compare_segment("0", r),
            (Some(l), Some(r)) => compare_segment(l, r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Returns `true` when `stored` already covers `requested`.
pub fn is_applied(stored: &str, requested: &str) -> bool {
    compare_versions(stored, requested) != Ordering::Less
}

/// Returns the greatest version of `versions`, if any.
pub fn max_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_compare_numerically() {
        assert_eq!(compare_versions("2.0", "10.0"), Ordering::Less);
        assert_eq!(compare_versions("1.2.3", "1.2.10"), Ordering::Less);
    }

    #[test]
    fn test_non_numeric_segments_compare_lexically() {
        assert_eq!(compare_versions("1.0-beta", "1.0-alpha"), Ordering::Greater);
    }

    #[test]
    fn test_is_applied_is_inclusive() {
        assert!(is_applied("1.0", "1.0"));
        assert!(is_applied("1.1", "1.0"));
        assert!(!is_applied("0.0", "1.0"));
    }

    #[test]
    fn test_max_version_uses_segment_order() {
        let versions = ["1.9", "1.10", "1.2"];
        assert_eq!(max_version(versions.iter().copied()), Some("1.10"));
        assert_eq!(max_version(std::iter::empty()), None);
    }
}
