//! Deterministic identifiers for records the source data does not number.
//!
//! Ids are the first eight bytes of a SHA-256 digest, big-endian, masked to 63
//! bits so they always fit a signed SQLite integer. Repeated imports of the
//! same path or timezone name therefore collide on purpose.

use sha2::{Digest, Sha256};

const ID_MASK: u64 = i64::MAX as u64;

fn stable_hash(text: &str) -> i64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    // Masked to 63 bits, so the conversion cannot fail.
    i64::try_from(u64::from_be_bytes(prefix) & ID_MASK).unwrap_or(i64::MAX)
}

/// Synthetic (negative, never zero) id for a location identified only by its
/// structural path.
pub fn synthetic_location_id(path: &str) -> i64 {
    -stable_hash(path).max(1)
}

/// Positive id for a timezone, derived from its name.
pub fn timezone_id(name: &str) -> i64 {
    stable_hash(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_ids_are_negative_and_stable() {
        let europe = synthetic_location_id("/Europe|EU");
        assert!(europe < 0);
        assert_eq!(europe, synthetic_location_id("/Europe|EU"));
        assert_ne!(europe, synthetic_location_id("/Europe|EU/France|FR"));
    }

    #[test]
    fn test_timezone_ids_are_positive_and_stable() {
        let paris = timezone_id("Europe/Paris");
        assert!(paris >= 0);
        assert_eq!(paris, timezone_id("Europe/Paris"));
        assert_ne!(paris, timezone_id("Europe/Berlin"));
    }
}
