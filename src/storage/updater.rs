//! Batched inserts inside a replace transaction.

use futures::{Stream, StreamExt};
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Sqlite, Transaction};

use crate::config::INSERT_BATCH_SIZE;
use crate::error_handling::DatabaseError;
use crate::geoip::{AddressBlock, Location, Timezone};

type Row<'b> = Separated<'b, 'static, Sqlite, &'static str>;

/// Write access to the dataset during [`GeoIpStore::replace_all`].
///
/// Each insert pulls rows lazily from its stream and writes them in
/// multi-row statements of at most [`INSERT_BATCH_SIZE`] rows, returning the
/// number of rows inserted.
///
/// [`GeoIpStore::replace_all`]: super::GeoIpStore::replace_all
pub struct Updater {
    pub(super) tx: Transaction<'static, Sqlite>,
}

impl Updater {
    /// Inserts locale codes; codes already present are ignored.
    pub async fn insert_locales<S>(&mut self, locales: S) -> Result<u64, DatabaseError>
    where
        S: Stream<Item = String> + Send,
    {
        insert_batched(
            &mut self.tx,
            locales,
            "INSERT INTO locales (code) ",
            " ON CONFLICT (code) DO NOTHING",
            |mut row: Row<'_>, code: String| {
                row.push_bind(code);
            },
        )
        .await
    }

    /// Timezone ids derive from names, so the same timezone may arrive once
    /// per locale; repeats are ignored.
    pub async fn insert_timezones<S>(&mut self, timezones: S) -> Result<u64, DatabaseError>
    where
        S: Stream<Item = Timezone> + Send,
    {
        insert_batched(
            &mut self.tx,
            timezones,
            "INSERT INTO timezones (id, name) ",
            " ON CONFLICT (id) DO NOTHING",
            |mut row: Row<'_>, timezone: Timezone| {
                row.push_bind(timezone.id).push_bind(timezone.name);
            },
        )
        .await
    }

    /// Inserts location nodes. Parent references are checked at commit, so
    /// children may arrive before their parents.
    pub async fn insert_locations<S>(&mut self, locations: S) -> Result<u64, DatabaseError>
    where
        S: Stream<Item = Location> + Send,
    {
        insert_batched(
            &mut self.tx,
            locations,
            "INSERT INTO locations (id, locale_code, parent_id, level, name, code, \
             is_in_european_union, timezone_id) ",
            "",
            |mut row: Row<'_>, location: Location| {
                row.push_bind(location.id)
                    .push_bind(location.locale_code)
                    .push_bind(location.parent_id)
                    .push_bind(location.level.as_ref().to_string())
                    .push_bind(location.name)
                    .push_bind(location.code)
                    .push_bind(location.is_in_european_union)
                    .push_bind(location.timezone_id);
            },
        )
        .await
    }

    /// Inserts address blocks.
    pub async fn insert_blocks<S>(&mut self, blocks: S) -> Result<u64, DatabaseError>
    where
        S: Stream<Item = AddressBlock> + Send,
    {
        insert_batched(
            &mut self.tx,
            blocks,
            "INSERT INTO blocks (start, stop, location_id, postal_code, latitude, longitude, \
             accuracy_radius, is_anonymous_proxy, is_satellite_provider) ",
            "",
            |mut row: Row<'_>, block: AddressBlock| {
                row.push_bind(block.start.to_vec())
                    .push_bind(block.stop.to_vec())
                    .push_bind(block.location_id)
                    .push_bind(block.postal_code)
                    .push_bind(block.latitude)
                    .push_bind(block.longitude)
                    .push_bind(block.accuracy_radius)
                    .push_bind(block.is_anonymous_proxy)
                    .push_bind(block.is_satellite_provider);
            },
        )
        .await
    }
}

async fn insert_batched<T, S, F>(
    tx: &mut Transaction<'static, Sqlite>,
    rows: S,
    insert: &str,
    suffix: &str,
    mut push_row: F,
) -> Result<u64, DatabaseError>
where
    T: Send,
    S: Stream<Item = T> + Send,
    F: FnMut(Row<'_>, T) + Send,
{
    let batches = rows.chunks(INSERT_BATCH_SIZE);
    futures::pin_mut!(batches);

    let mut inserted = 0;
    while let Some(batch) = batches.next().await {
        let mut builder: QueryBuilder<'static, Sqlite> = QueryBuilder::new(insert);
        builder.push_values(batch, &mut push_row);
        builder.push(suffix);
        inserted += builder.build().execute(&mut **tx).await?.rows_affected();
    }
    Ok(inserted)
}
