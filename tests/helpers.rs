// Shared test helpers for fixture archives and database setup.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::io::Write;
use std::time::Duration;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use geoip_service::storage::{init_db_pool_with_path, run_migrations};
use geoip_service::{GeoIpStore, UpdateService};

/// Block rows as shipped in `GeoLite2-City-Blocks-IPv4.csv`.
#[allow(dead_code)] // Used by other test files
pub const IPV4_BLOCKS: &str = "\
network,geoname_id,registered_country_geoname_id,represented_country_geoname_id,is_anonymous_proxy,is_satellite_provider,postal_code,latitude,longitude,accuracy_radius
203.0.113.0/24,42,42,,0,0,,-33.8,151.2,500
198.51.100.0/24,7,7,,0,1,75001,48.86,2.34,20
";

/// Block rows as shipped in `GeoLite2-City-Blocks-IPv6.csv`.
#[allow(dead_code)]
pub const IPV6_BLOCKS: &str = "\
network,geoname_id,registered_country_geoname_id,represented_country_geoname_id,is_anonymous_proxy,is_satellite_provider,postal_code,latitude,longitude,accuracy_radius
2001:db8::/32,42,42,,0,0,,-33.8,151.2,500
";

/// English location rows: a country-level row and a city-level row.
#[allow(dead_code)]
pub const EN_LOCATIONS: &str = "\
geoname_id,locale_code,continent_code,continent_name,country_iso_code,country_name,subdivision_1_iso_code,subdivision_1_name,subdivision_2_iso_code,subdivision_2_name,city_name,metro_code,time_zone,is_in_european_union
42,en,OC,Oceania,TL,Testland,,,,,,,Pacific/Testland,0
7,en,EU,Europe,FR,France,IDF,\"Ile-de-France\",75,Paris,Paris,,Europe/Paris,1
";

/// German location rows for the same geonames.
#[allow(dead_code)]
pub const DE_LOCATIONS: &str = "\
geoname_id,locale_code,continent_code,continent_name,country_iso_code,country_name,subdivision_1_iso_code,subdivision_1_name,subdivision_2_iso_code,subdivision_2_name,city_name,metro_code,time_zone,is_in_european_union
42,de,OC,Ozeanien,TL,Testland,,,,,,,Pacific/Testland,0
7,de,EU,Europa,FR,Frankreich,IDF,\"Ile-de-France\",75,Paris,Paris,,Europe/Paris,1
";

/// Builds an in-memory ZIP archive from `(entry name, content)` pairs.
#[allow(dead_code)]
pub fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start archive entry");
        zip.write_all(content.as_bytes())
            .expect("Failed to write archive entry");
    }
    zip.finish()
        .expect("Failed to finish archive")
        .into_inner()
}

/// The full sample archive, laid out like the GeoLite2 City CSV download.
#[allow(dead_code)]
pub fn sample_archive() -> Vec<u8> {
    build_archive(&[
        ("GeoLite2-City-CSV_20240102/LICENSE.txt", "license text"),
        ("GeoLite2-City-CSV_20240102/GeoLite2-City-Locations-en.csv", EN_LOCATIONS),
        ("GeoLite2-City-CSV_20240102/GeoLite2-City-Locations-de.csv", DE_LOCATIONS),
        ("GeoLite2-City-CSV_20240102/GeoLite2-City-Blocks-IPv4.csv", IPV4_BLOCKS),
        ("GeoLite2-City-CSV_20240102/GeoLite2-City-Blocks-IPv6.csv", IPV6_BLOCKS),
    ])
}

/// Creates a migrated store backed by a SQLite file inside a fresh temp dir.
///
/// The temp dir must outlive the store.
#[allow(dead_code)]
pub async fn create_test_store() -> (TempDir, GeoIpStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = init_db_pool_with_path(&dir.path().join("geoip.db"))
        .await
        .expect("Failed to create database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    (dir, GeoIpStore::new(pool))
}

/// Waits until no update is running, failing the test after 30 seconds.
#[allow(dead_code)]
pub async fn wait_until_idle(updates: &UpdateService) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while updates.is_updating() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("Update did not finish in time");
}
