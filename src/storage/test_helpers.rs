//! Shared test helpers for storage module tests.
//!
//! This module provides common utilities for database setup and test data creation
//! used across storage module tests.

use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::geoip::{parse_network, AddressBlock, Location, LocationLevel, Timezone};
use crate::storage::run_migrations;

/// Creates a test database pool with migrations applied.
///
/// Uses an in-memory database for fast test execution. The pool holds a
/// single connection that never expires, since every connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn create_test_pool() -> Arc<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(pool)
}

/// Builds a block for `network` pointing at `location_id`.
pub fn block(network: &str, location_id: Option<i64>) -> AddressBlock {
    let (start, stop) = parse_network(network).expect("valid test network");
    AddressBlock {
        start,
        stop,
        location_id,
        postal_code: None,
        latitude: None,
        longitude: None,
        accuracy_radius: None,
        is_anonymous_proxy: false,
        is_satellite_provider: false,
    }
}

/// Builds a location of the `en` locale.
pub fn location(
    id: i64,
    parent_id: Option<i64>,
    level: LocationLevel,
    name: &str,
    code: Option<&str>,
) -> Location {
    Location {
        id,
        locale_code: "en".to_string(),
        parent_id,
        level,
        name: Some(name.to_string()),
        code: code.map(str::to_string),
        is_in_european_union: None,
        timezone_id: None,
    }
}

pub fn timezone(id: i64, name: &str) -> Timezone {
    Timezone {
        id,
        name: name.to_string(),
    }
}
