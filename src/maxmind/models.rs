//! Row shapes of the provider's CSV files.

use crate::error_handling::CodecError;
use crate::geoip::{parse_network, AddressBlock, LocationLevel};
use crate::tabular::{FieldSetter, FieldSpec, TabularRecord};

/// One row of a `*-Blocks-*.csv` file.
///
/// Country, city and ASN editions share this shape; each fills a subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxMindBlock {
    pub network: Option<String>,
    pub geoname_id: Option<i64>,
    pub registered_country_geoname_id: Option<i64>,
    pub represented_country_geoname_id: Option<i64>,
    pub is_anonymous_proxy: Option<bool>,
    pub is_satellite_provider: Option<bool>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_radius: Option<i32>,
    pub autonomous_system_number: Option<String>,
    pub autonomous_system_organization: Option<String>,
}

impl TabularRecord for MaxMindBlock {
    const SHAPE: &'static str = "MaxMindBlock";

    fn fields() -> &'static [FieldSpec<Self>] {
        static FIELDS: [FieldSpec<MaxMindBlock>; 12] = [
            FieldSpec::new("network", FieldSetter::Text(|b, v| b.network = Some(v))),
            FieldSpec::new("geonameId", FieldSetter::I64(|b, v| b.geoname_id = Some(v))),
            FieldSpec::new(
                "registeredCountryGeonameId",
                FieldSetter::I64(|b, v| b.registered_country_geoname_id = Some(v)),
            ),
            FieldSpec::new(
                "representedCountryGeonameId",
                FieldSetter::I64(|b, v| b.represented_country_geoname_id = Some(v)),
            ),
            FieldSpec::new(
                "isAnonymousProxy",
                FieldSetter::Bool(|b, v| b.is_anonymous_proxy = Some(v)),
            ),
            FieldSpec::new(
                "isSatelliteProvider",
                FieldSetter::Bool(|b, v| b.is_satellite_provider = Some(v)),
            ),
            FieldSpec::new("postalCode", FieldSetter::Text(|b, v| b.postal_code = Some(v))),
            FieldSpec::new("latitude", FieldSetter::F64(|b, v| b.latitude = Some(v))),
            FieldSpec::new("longitude", FieldSetter::F64(|b, v| b.longitude = Some(v))),
            FieldSpec::new(
                "accuracyRadius",
                FieldSetter::I32(|b, v| b.accuracy_radius = Some(v)),
            ),
            FieldSpec::new(
                "autonomousSystemNumber",
                FieldSetter::Text(|b, v| b.autonomous_system_number = Some(v)),
            ),
            FieldSpec::new(
                "autonomousSystemOrganization",
                FieldSetter::Text(|b, v| b.autonomous_system_organization = Some(v)),
            ),
        ];
        &FIELDS
    }
}

impl TryFrom<MaxMindBlock> for AddressBlock {
    type Error = CodecError;

    /// Normalizes the row's network into a key range. A row without a network
    /// is malformed.
    fn try_from(row: MaxMindBlock) -> Result<Self, Self::Error> {
        let network = row
            .network
            .ok_or_else(|| CodecError::MalformedNetwork(String::new()))?;
        let (start, stop) = parse_network(&network)?;
        Ok(AddressBlock {
            start,
            stop,
            location_id: row.geoname_id,
            postal_code: row.postal_code,
            latitude: row.latitude,
            longitude: row.longitude,
            accuracy_radius: row.accuracy_radius,
            is_anonymous_proxy: row.is_anonymous_proxy.unwrap_or(false),
            is_satellite_provider: row.is_satellite_provider.unwrap_or(false),
        })
    }
}

/// One row of a `*-Locations-<locale>.csv` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxMindLocation {
    pub geoname_id: Option<i64>,
    pub locale_code: Option<String>,
    pub continent_code: Option<String>,
    pub continent_name: Option<String>,
    pub country_iso_code: Option<String>,
    pub country_name: Option<String>,
    pub is_in_european_union: Option<bool>,
    pub subdivision_1_iso_code: Option<String>,
    pub subdivision_1_name: Option<String>,
    pub subdivision_2_iso_code: Option<String>,
    pub subdivision_2_name: Option<String>,
    pub city_name: Option<String>,
    pub metro_code: Option<String>,
    pub time_zone: Option<String>,
}

impl TabularRecord for MaxMindLocation {
    const SHAPE: &'static str = "MaxMindLocation";

    fn fields() -> &'static [FieldSpec<Self>] {
        static FIELDS: [FieldSpec<MaxMindLocation>; 14] = [
            FieldSpec::new("geonameId", FieldSetter::I64(|l, v| l.geoname_id = Some(v))),
            FieldSpec::new("localeCode", FieldSetter::Text(|l, v| l.locale_code = Some(v))),
            FieldSpec::new(
                "continentCode",
                FieldSetter::Text(|l, v| l.continent_code = Some(v)),
            ),
            FieldSpec::new(
                "continentName",
                FieldSetter::Text(|l, v| l.continent_name = Some(v)),
            ),
            FieldSpec::new(
                "countryIsoCode",
                FieldSetter::Text(|l, v| l.country_iso_code = Some(v)),
            ),
            FieldSpec::new("countryName", FieldSetter::Text(|l, v| l.country_name = Some(v))),
            FieldSpec::new(
                "isInEuropeanUnion",
                FieldSetter::Bool(|l, v| l.is_in_european_union = Some(v)),
            ),
            FieldSpec::new(
                "subdivision1IsoCode",
                FieldSetter::Text(|l, v| l.subdivision_1_iso_code = Some(v)),
            ),
            FieldSpec::new(
                "subdivision1Name",
                FieldSetter::Text(|l, v| l.subdivision_1_name = Some(v)),
            ),
            FieldSpec::new(
                "subdivision2IsoCode",
                FieldSetter::Text(|l, v| l.subdivision_2_iso_code = Some(v)),
            ),
            FieldSpec::new(
                "subdivision2Name",
                FieldSetter::Text(|l, v| l.subdivision_2_name = Some(v)),
            ),
            FieldSpec::new("cityName", FieldSetter::Text(|l, v| l.city_name = Some(v))),
            FieldSpec::new("metroCode", FieldSetter::Text(|l, v| l.metro_code = Some(v))),
            FieldSpec::new("timeZone", FieldSetter::Text(|l, v| l.time_zone = Some(v))),
        ];
        &FIELDS
    }
}

impl MaxMindLocation {
    /// Name and code the row contributes at `level`.
    ///
    /// Cities carry only a name and metro areas only a code.
    pub fn level_fields(&self, level: LocationLevel) -> (Option<&str>, Option<&str>) {
        let (name, code) = match level {
            LocationLevel::Continent => (&self.continent_name, &self.continent_code),
            LocationLevel::Country => (&self.country_name, &self.country_iso_code),
            LocationLevel::Subdivision1 => (&self.subdivision_1_name, &self.subdivision_1_iso_code),
            LocationLevel::Subdivision2 => (&self.subdivision_2_name, &self.subdivision_2_iso_code),
            LocationLevel::City => return (self.city_name.as_deref(), None),
            LocationLevel::Metro => return (None, self.metro_code.as_deref()),
        };
        (name.as_deref(), code.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ImportStats;
    use crate::tabular::TabularDecoder;
    use std::io::Cursor;
    use std::sync::Arc;

    #[test]
    fn test_every_provider_column_binds() {
        let header = "network,geoname_id,registered_country_geoname_id,represented_country_geoname_id,\
                      is_anonymous_proxy,is_satellite_provider,postal_code,latitude,longitude,accuracy_radius";
        let body = "1.0.0.0/24,2077456,2077456,,0,0,3095,-34.9,138.6,1000\n";
        let stats = Arc::new(ImportStats::new());
        let rows: Vec<MaxMindBlock> =
            TabularDecoder::from_reader(Cursor::new(format!("{}\n{}", header, body)), stats.clone())
                .expect("readable")
                .expect("header present")
                .collect::<std::io::Result<_>>()
                .expect("readable");

        assert_eq!(stats.total(), 0);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.geoname_id, Some(2077456));
        assert_eq!(row.represented_country_geoname_id, None);
        assert_eq!(row.is_anonymous_proxy, Some(false));
        assert_eq!(row.postal_code.as_deref(), Some("3095"));
        assert_eq!(row.accuracy_radius, Some(1000));
    }

    #[test]
    fn test_block_conversion() {
        let row = MaxMindBlock {
            network: Some("203.0.113.0/24".to_string()),
            geoname_id: Some(42),
            ..MaxMindBlock::default()
        };
        let block = AddressBlock::try_from(row).expect("valid network");
        assert_eq!(block.location_id, Some(42));
        assert!(block.start < block.stop);
        assert_eq!(block.postal_code, None);
        assert!(!block.is_anonymous_proxy);
    }

    #[test]
    fn test_block_without_network_is_malformed() {
        let row = MaxMindBlock {
            geoname_id: Some(42),
            ..MaxMindBlock::default()
        };
        assert!(matches!(
            AddressBlock::try_from(row),
            Err(CodecError::MalformedNetwork(_))
        ));
    }

    #[test]
    fn test_level_fields() {
        let row = MaxMindLocation {
            continent_code: Some("EU".to_string()),
            continent_name: Some("Europe".to_string()),
            city_name: Some("Paris".to_string()),
            metro_code: Some("501".to_string()),
            ..MaxMindLocation::default()
        };
        assert_eq!(
            row.level_fields(LocationLevel::Continent),
            (Some("Europe"), Some("EU"))
        );
        assert_eq!(row.level_fields(LocationLevel::Country), (None, None));
        assert_eq!(row.level_fields(LocationLevel::City), (Some("Paris"), None));
        assert_eq!(row.level_fields(LocationLevel::Metro), (None, Some("501")));
    }
}
