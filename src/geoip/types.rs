//! GeoIP data structures.
//!
//! This module defines the persisted dataset records (blocks, locations,
//! timezones) and the shapes returned by queries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use super::codec::FixedKey;

/// Administrative level of a location node, from broadest to most specific.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, AsRefStr, Display, EnumString, EnumIter,
)]
pub enum LocationLevel {
    #[strum(serialize = "CONTINENT")]
    #[serde(rename = "CONTINENT")]
    Continent,
    #[strum(serialize = "COUNTRY")]
    #[serde(rename = "COUNTRY")]
    Country,
    #[strum(serialize = "SUBDIVISION_1")]
    #[serde(rename = "SUBDIVISION_1")]
    Subdivision1,
    #[strum(serialize = "SUBDIVISION_2")]
    #[serde(rename = "SUBDIVISION_2")]
    Subdivision2,
    #[strum(serialize = "CITY")]
    #[serde(rename = "CITY")]
    City,
    #[strum(serialize = "METRO")]
    #[serde(rename = "METRO")]
    Metro,
}

/// A contiguous address range and the physical attributes attached to it.
///
/// Invariant: `start <= stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressBlock {
    pub start: FixedKey,
    pub stop: FixedKey,
    pub location_id: Option<i64>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_radius: Option<i32>,
    pub is_anonymous_proxy: bool,
    pub is_satellite_provider: bool,
}

/// A node of the per-locale location forest.
///
/// Positive ids are the dataset's geoname ids; negative ids are synthetic and
/// derived from the node's structural path.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub locale_code: String,
    pub parent_id: Option<i64>,
    pub level: LocationLevel,
    pub name: Option<String>,
    pub code: Option<String>,
    pub is_in_european_union: Option<bool>,
    pub timezone_id: Option<i64>,
}

/// A named timezone; `id` is derived from `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timezone {
    pub id: i64,
    pub name: String,
}

/// One element of a matched location's ancestor chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub id: i64,
    pub level: LocationLevel,
    pub name: Option<String>,
    pub code: Option<String>,
}

/// Result of an address lookup.
///
/// `locations` holds the matched location first, followed by its ancestors
/// up to the root. Missing values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressMatch {
    pub address: String,
    pub locale_code: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_radius: Option<i32>,
    pub is_anonymous_proxy: Option<bool>,
    pub is_satellite_provider: Option<bool>,
    pub is_in_european_union: Option<bool>,
    pub timezone: Option<String>,
    pub locations: Vec<LocationSummary>,
}

/// Dataset status as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub updated_at: Option<DateTime<Utc>>,
    pub updating: bool,
}
