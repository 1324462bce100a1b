//! Range codec for network blocks.
//!
//! Every address, IPv4 or IPv6, is normalized into a 16-byte [`FixedKey`] so
//! that ranges from both families share one byte-lexicographic ordering.
//! IPv4 addresses occupy the IPv4-mapped region (`::ffff:a.b.c.d`), the same
//! place a query address lands after [`address_to_key`], so stored ranges and
//! lookups always live in the same key space.

use std::fmt;
use std::net::IpAddr;

use crate::error_handling::CodecError;

/// Width of a normalized address key in bytes.
pub const KEY_LEN: usize = 16;

/// Prefix bits added to an IPv4 prefix length to place it in the mapped region.
const IPV4_MAPPED_PREFIX_BITS: u32 = 96;

/// A 16-byte, order-comparable address key.
///
/// The derived `Ord` compares the bytes lexicographically, which matches the
/// BLOB ordering used by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedKey([u8; KEY_LEN]);

impl FixedKey {
    /// Wraps raw key bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        FixedKey(bytes)
    }

    /// Returns the raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Returns the key as a `Vec<u8>`, ready to be bound as a BLOB.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Rebuilds a key from a stored BLOB, if it has the right width.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; KEY_LEN]>::try_from(bytes).ok().map(FixedKey)
    }
}

impl From<IpAddr> for FixedKey {
    fn from(address: IpAddr) -> Self {
        match address {
            IpAddr::V4(v4) => FixedKey(v4.to_ipv6_mapped().octets()),
            IpAddr::V6(v6) => FixedKey(v6.octets()),
        }
    }
}

impl fmt::Display for FixedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Parses a CIDR network (`a.b.c.d/n` or `x:y::z/n`) into its inclusive
/// `(start, stop)` key range.
///
/// # Errors
///
/// Returns [`CodecError::MalformedNetwork`] when the text has no prefix
/// length, the address cannot be parsed, or the prefix exceeds the family's
/// width.
pub fn parse_network(cidr: &str) -> Result<(FixedKey, FixedKey), CodecError> {
    let malformed = || CodecError::MalformedNetwork(cidr.to_string());

    let (address_text, prefix_text) = cidr.trim().split_once('/').ok_or_else(malformed)?;
    let address: IpAddr = address_text.parse().map_err(|_| malformed())?;
    let prefix: u32 = prefix_text.parse().map_err(|_| malformed())?;

    let prefix = match address {
        IpAddr::V4(_) if prefix <= 32 => prefix + IPV4_MAPPED_PREFIX_BITS,
        IpAddr::V6(_) if prefix <= 128 => prefix,
        _ => return Err(malformed()),
    };

    let address = FixedKey::from(address).0;
    let mut start = [0u8; KEY_LEN];
    let mut stop = [0u8; KEY_LEN];

    for (i, byte) in address.iter().enumerate() {
        let byte_start = i as u32 * 8;
        if byte_start + 8 <= prefix {
            start[i] = *byte;
            stop[i] = *byte;
        } else if byte_start >= prefix || prefix % 8 == 0 {
            start[i] = 0x00;
            stop[i] = 0xFF;
        } else {
            // Only the byte straddling the prefix boundary is partially masked.
            let mask: u8 = (1u8 << (8 - prefix % 8)) - 1;
            start[i] = byte & !mask;
            stop[i] = byte | mask;
        }
    }

    Ok((FixedKey(start), FixedKey(stop)))
}

/// Normalizes a literal address into its [`FixedKey`] for query-time lookups.
///
/// # Errors
///
/// Returns [`CodecError::MalformedAddress`] on unparsable input.
pub fn address_to_key(address: &str) -> Result<FixedKey, CodecError> {
    address
        .trim()
        .parse::<IpAddr>()
        .map(FixedKey::from)
        .map_err(|_| CodecError::MalformedAddress(address.to_string()))
}
