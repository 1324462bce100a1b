//! Dataset queries and the transactional full replace.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use crate::config::{LOOKUP_CANDIDATES, MAX_ANCESTOR_DEPTH};
use crate::error_handling::{DatabaseError, LookupError};
use crate::geoip::{address_to_key, AddressMatch, LocationLevel, LocationSummary};

use super::pool::DbPool;
use super::updater::Updater;

/// Tables wiped by a replace, children first.
const REPLACED_TABLES: [&str; 4] = ["blocks", "locations", "timezones", "locales"];

/// Read and replace access to the persisted dataset.
#[derive(Clone)]
pub struct GeoIpStore {
    pool: DbPool,
}

impl GeoIpStore {
    /// Wraps a migrated pool.
    pub fn new(pool: DbPool) -> Self {
        GeoIpStore { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Distinct locale codes present in the dataset.
    pub async fn list_locales(&self) -> Result<Vec<String>, DatabaseError> {
        let locales = sqlx::query_scalar("SELECT code FROM locales ORDER BY code")
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(locales)
    }

    /// Time the last successful replace committed, if any.
    pub async fn find_last_update_time(&self) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT updated_at FROM updates ORDER BY id DESC LIMIT 1")
                .fetch_optional(self.pool.as_ref())
                .await?;
        millis
            .map(|ms| {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| DatabaseError::InvalidValue {
                    column: "updated_at",
                    value: ms.to_string(),
                })
            })
            .transpose()
    }

    /// Looks up the block containing `address` and the ancestor chain of its
    /// location in `locale_code`.
    ///
    /// Returns `Ok(None)` when no block contains the address. A block whose
    /// location is missing from the locale yields an empty chain.
    ///
    /// Only the [`LOOKUP_CANDIDATES`] blocks starting closest below the
    /// address are checked, so a miss costs the same as a hit. Of those, the
    /// containing block with the largest start wins.
    pub async fn find_address(
        &self,
        address: &str,
        locale_code: &str,
    ) -> Result<Option<AddressMatch>, LookupError> {
        let key = address_to_key(address)?;

        // One read transaction, so the block and its chain come from the same
        // committed dataset even if a replace commits in between.
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let row = sqlx::query(
            "SELECT b.location_id, b.postal_code, b.latitude, b.longitude, b.accuracy_radius,
                    b.is_anonymous_proxy, b.is_satellite_provider,
                    l.is_in_european_union, t.name AS timezone
             FROM (
                 SELECT * FROM (
                     SELECT * FROM blocks
                     WHERE start <= ?1
                     ORDER BY start DESC
                     LIMIT ?3
                 )
                 WHERE stop >= ?1
                 ORDER BY start DESC
                 LIMIT 1
             ) AS b
             LEFT JOIN locations AS l ON l.id = b.location_id AND l.locale_code = ?2
             LEFT JOIN timezones AS t ON t.id = l.timezone_id",
        )
        .bind(key.to_vec())
        .bind(locale_code)
        .bind(LOOKUP_CANDIDATES)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        let Some(row) = row else {
            debug!("No block contains {} ({})", address, key);
            return Ok(None);
        };

        let location_id: Option<i64> = row.try_get("location_id").map_err(DatabaseError::from)?;
        let locations = match location_id {
            Some(id) => find_ancestors(&mut tx, id, locale_code).await?,
            None => Vec::new(),
        };
        tx.commit().await.map_err(DatabaseError::from)?;

        Ok(Some(to_address_match(&row, address, locale_code, locations)?))
    }

    /// Replaces the whole dataset inside one transaction.
    ///
    /// Deletes every block, location, timezone and locale, lets `body` insert
    /// the new rows through the [`Updater`], records the update time and
    /// commits. If `body` or any step fails the transaction is rolled back
    /// and the previous dataset stays untouched.
    pub async fn replace_all<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: for<'u> FnOnce(&'u mut Updater) -> BoxFuture<'u, Result<T, E>>,
        E: From<DatabaseError>,
    {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
        for table in REPLACED_TABLES {
            let deleted = sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from)?
                .rows_affected();
            debug!("Deleted {} rows from {}", deleted, table);
        }

        let mut updater = Updater { tx };
        let outcome = body(&mut updater).await;
        let Updater { mut tx } = updater;

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Failed to roll back dataset replace: {}", rollback_err);
                }
                info!("Dataset replace rolled back");
                return Err(e);
            }
        };

        sqlx::query("INSERT INTO updates (updated_at) VALUES (?)")
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
        tx.commit().await.map_err(DatabaseError::from)?;
        info!("Dataset replace committed");
        Ok(value)
    }
}

/// Walks from `location_id` up to its root within one locale, closest first.
async fn find_ancestors(
    tx: &mut Transaction<'static, Sqlite>,
    location_id: i64,
    locale_code: &str,
) -> Result<Vec<LocationSummary>, DatabaseError> {
    let rows = sqlx::query(
        "WITH RECURSIVE chain (id, parent_id, level, name, code, depth) AS (
             SELECT id, parent_id, level, name, code, 0
             FROM locations
             WHERE id = ?1 AND locale_code = ?2
             UNION ALL
             SELECT l.id, l.parent_id, l.level, l.name, l.code, chain.depth + 1
             FROM locations AS l
             JOIN chain ON l.id = chain.parent_id
             WHERE l.locale_code = ?2 AND chain.depth + 1 < ?3
         )
         SELECT id, level, name, code FROM chain ORDER BY depth",
    )
    .bind(location_id)
    .bind(locale_code)
    .bind(MAX_ANCESTOR_DEPTH)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter()
        .map(|row| -> Result<LocationSummary, DatabaseError> {
            let level: String = row.try_get("level")?;
            let level = LocationLevel::from_str(&level).map_err(|_| DatabaseError::InvalidValue {
                column: "level",
                value: level.clone(),
            })?;
            Ok(LocationSummary {
                id: row.try_get("id")?,
                level,
                name: row.try_get("name")?,
                code: row.try_get("code")?,
            })
        })
        .collect()
}

fn to_address_match(
    row: &SqliteRow,
    address: &str,
    locale_code: &str,
    locations: Vec<LocationSummary>,
) -> Result<AddressMatch, DatabaseError> {
    Ok(AddressMatch {
        address: address.to_string(),
        locale_code: locale_code.to_string(),
        postal_code: row.try_get("postal_code")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        accuracy_radius: row.try_get("accuracy_radius")?,
        is_anonymous_proxy: Some(row.try_get("is_anonymous_proxy")?),
        is_satellite_provider: Some(row.try_get("is_satellite_provider")?),
        is_in_european_union: row.try_get("is_in_european_union")?,
        timezone: row.try_get("timezone")?,
        locations,
    })
}
