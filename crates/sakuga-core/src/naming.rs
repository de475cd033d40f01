//! Filename hygiene for exported levels and image sequences.
//!
//! Layer names come straight from the source document and may contain
//! anything; everything written to disk goes through these helpers first.

use std::collections::HashSet;

/// Characters that are problematic in filenames across operating systems.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize a string for use as a filename.
///
/// Replaces spaces with underscores, strips forbidden characters and
/// leading/trailing dots. Falls back to "unnamed" if nothing survives.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .replace(' ', "_")
        .chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .collect();
    let sanitized = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Generate a unique name by appending a numeric suffix if necessary.
///
/// If `name` is already in `used`, tries `name_1`, `name_2`, ... until a
/// free one is found. The chosen name is inserted into `used`.
pub fn make_unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{}_{}", name, counter);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Zero-pad a sequence number to `width` digits.
pub fn zero_pad(value: u32, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_spaces_and_forbidden() {
        assert_eq!(sanitize_name("Rough Key 01"), "Rough_Key_01");
        assert_eq!(sanitize_name("a/b\\c:d"), "abcd");
        assert_eq!(sanitize_name("..hidden.."), "hidden");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_name(""), "unnamed");
        assert_eq!(sanitize_name("???"), "unnamed");
    }

    #[test]
    fn test_make_unique_name_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(make_unique_name("Ink", &mut used), "Ink");
        assert_eq!(make_unique_name("Ink", &mut used), "Ink_1");
        assert_eq!(make_unique_name("Ink", &mut used), "Ink_2");
        assert_eq!(make_unique_name("Paint", &mut used), "Paint");
    }

    #[test]
    fn test_zero_pad() {
        assert_eq!(zero_pad(1, 4), "0001");
        assert_eq!(zero_pad(123, 4), "0123");
        assert_eq!(zero_pad(12345, 4), "12345");
    }
}
