//! SHA-256 hashing for surrogate ids and change signatures.

use crate::relation::Value;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hex digest of a string
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 hex digest of an ordered sequence of nullable values.
///
/// Each value is length-prefixed and NULL has its own marker, so
/// `["a|b", NULL]` and `["a", "b|"]` never collide through concatenation and
/// NULL never hashes like the empty string.
pub fn checksum_values<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut hasher = Sha256::new();
    for value in values {
        match value {
            Some(text) => {
                hasher.update(b"v");
                hasher.update(text.len().to_le_bytes());
                hasher.update(text.as_bytes());
            }
            None => hasher.update(b"n"),
        }
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum_is_stable() {
        assert_eq!(compute_checksum("abc"), compute_checksum("abc"));
        assert_eq!(compute_checksum("abc").len(), 64);
        assert_ne!(compute_checksum("abc"), compute_checksum("abd"));
    }

    #[test]
    fn test_checksum_values_distinguishes_null_from_empty() {
        let with_null = vec![None];
        let with_empty = vec![Some(String::new())];
        assert_ne!(checksum_values(&with_null), checksum_values(&with_empty));
    }

    #[test]
    fn test_checksum_values_is_not_fooled_by_concatenation() {
        let a = vec![Some("a|b".to_string()), Some(String::new())];
        let b = vec![Some("a".to_string()), Some("b|".to_string())];
        assert_ne!(checksum_values(&a), checksum_values(&b));
    }

    #[test]
    fn test_checksum_values_is_order_sensitive() {
        let a = vec![Some("x".to_string()), Some("y".to_string())];
        let b = vec![Some("y".to_string()), Some("x".to_string())];
        assert_ne!(checksum_values(&a), checksum_values(&b));
    }
}
