//! GeoIP dataset model.
//!
//! This module defines the records persisted by the storage engine, the
//! range codec that turns CIDR networks into comparable 16-byte keys, and the
//! deterministic id derivation used for synthetic locations and timezones.

pub mod codec;
pub mod ids;
mod types;

// Re-export public API
pub use codec::{address_to_key, parse_network, FixedKey, KEY_LEN};
pub use types::{
    AddressBlock, AddressMatch, Location, LocationLevel, LocationSummary, Timezone, UpdateStatus,
};
