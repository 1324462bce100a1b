//! One dataset update: fetch the archive, then replace the dataset from it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{stream, FutureExt, StreamExt};
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{ARCHIVE_TEMP_PREFIX, ARCHIVE_TEMP_SUFFIX};
use crate::error_handling::{ImportStats, UpdateError};
use crate::maxmind::{read_archive, ArchiveEntry};
use crate::storage::{GeoIpStore, Updater};

use super::download::download_archive;
use super::UpdateConfig;

/// Where the archive of a run comes from.
pub(crate) enum ArchiveSource {
    /// Download from this (licence-key resolved) URL.
    Download(String),
    /// Copy from an uploaded stream.
    Upload(Box<dyn AsyncRead + Send + Unpin>),
}

/// Row counts written by a successful update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub locales: u64,
    pub timezones: u64,
    pub locations: u64,
    pub blocks: u64,
}

/// Runs one update to completion.
///
/// The archive lives in a temporary file for the duration of the run and is
/// deleted afterwards, whatever the outcome.
pub(crate) async fn run_update(
    store: &GeoIpStore,
    client: &reqwest::Client,
    config: &UpdateConfig,
    source: ArchiveSource,
    cancel: CancellationToken,
) -> Result<ImportSummary, UpdateError> {
    let archive = tempfile::Builder::new()
        .prefix(ARCHIVE_TEMP_PREFIX)
        .suffix(ARCHIVE_TEMP_SUFFIX)
        .tempfile()?
        .into_temp_path();

    let result = async {
        match source {
            ArchiveSource::Download(url) => {
                download_archive(client, &url, &archive, config, &cancel).await?;
            }
            ArchiveSource::Upload(reader) => {
                copy_upload(reader, &archive, config.max_archive_size, &cancel).await?;
            }
        }
        import_archive(store, &archive, cancel.clone()).await
    }
    .await;

    let archive_path = archive.to_path_buf();
    if let Err(e) = archive.close() {
        warn!(
            "Failed to delete temporary archive {}: {}",
            archive_path.display(),
            e
        );
    }
    result
}

async fn copy_upload(
    reader: Box<dyn AsyncRead + Send + Unpin>,
    dest: &Path,
    limit: u64,
    cancel: &CancellationToken,
) -> Result<u64, UpdateError> {
    let mut file = tokio::fs::File::create(dest).await?;
    // One byte past the limit is enough to tell it was exceeded.
    let mut limited = reader.take(limit.saturating_add(1));
    let copied = tokio::select! {
        copied = tokio::io::copy(&mut limited, &mut file) => copied?,
        _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
    };
    if copied > limit {
        return Err(UpdateError::ArchiveTooLarge {
            size: copied,
            limit,
        });
    }
    file.flush().await?;
    info!("Received uploaded archive of {} bytes", copied);
    Ok(copied)
}

/// Replaces the dataset with the content of the archive at `path`.
///
/// The archive is read on a blocking thread while rows are written inside
/// the replace transaction. A cancelled run stops reading and fails, so the
/// transaction rolls back.
pub(crate) async fn import_archive(
    store: &GeoIpStore,
    path: &Path,
    cancel: CancellationToken,
) -> Result<ImportSummary, UpdateError> {
    let stats = Arc::new(ImportStats::new());
    let path = path.to_path_buf();
    let body_stats = stats.clone();

    let result = store
        .replace_all(move |updater| import_entries(updater, path, cancel, body_stats).boxed())
        .await;

    stats.log_summary();
    result
}

async fn import_entries(
    updater: &mut Updater,
    path: PathBuf,
    cancel: CancellationToken,
    stats: Arc<ImportStats>,
) -> Result<ImportSummary, UpdateError> {
    let (sink, mut entries) = mpsc::channel(1);
    let reader_cancel = cancel.clone();
    let reader = tokio::task::spawn_blocking(move || {
        read_archive(&path, sink, reader_cancel, stats)
    });

    let mut summary = ImportSummary::default();
    let consumed = async {
        loop {
            let entry = tokio::select! {
                entry = entries.recv() => entry,
                _ = cancel.cancelled() => None,
            };
            let Some(entry) = entry else { break };
            insert_entry(updater, entry, &cancel, &mut summary).await?;
        }
        Ok::<_, UpdateError>(())
    }
    .await;

    // Lets the reader give up if it is still waiting to hand over an entry.
    drop(entries);
    let read = reader
        .await
        .map_err(|e| UpdateError::Worker(e.to_string()))?;
    consumed?;
    read?;

    if cancel.is_cancelled() {
        return Err(UpdateError::Cancelled);
    }
    Ok(summary)
}

async fn insert_entry(
    updater: &mut Updater,
    entry: ArchiveEntry,
    cancel: &CancellationToken,
    summary: &mut ImportSummary,
) -> Result<(), UpdateError> {
    match entry {
        ArchiveEntry::Blocks {
            name,
            subtype,
            rows,
        } => {
            let rows = stream::unfold(rows, |mut rows| async move {
                rows.recv().await.map(|block| (block, rows))
            })
            .take_until(cancel.cancelled());
            let count = updater.insert_blocks(rows).await?;
            info!("Inserted {} {} blocks from {}", count, subtype, name);
            summary.blocks += count;
        }
        ArchiveEntry::Locations {
            name,
            locale,
            hierarchy,
        } => {
            summary.locales += updater.insert_locales(stream::iter([locale.clone()])).await?;

            let timezones = stream::iter(hierarchy.timezones).take_until(cancel.cancelled());
            let count = updater.insert_timezones(timezones).await?;
            info!("Inserted {} timezones from {}", count, name);
            summary.timezones += count;

            let locations = stream::iter(hierarchy.locations).take_until(cancel.cancelled());
            let count = updater.insert_locations(locations).await?;
            info!("Inserted {} {} locations from {}", count, locale, name);
            summary.locations += count;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::create_test_pool;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const BLOCKS: &str = "network,geoname_id,registered_country_geoname_id,represented_country_geoname_id,is_anonymous_proxy,is_satellite_provider,postal_code,latitude,longitude,accuracy_radius\n\
        203.0.113.0/24,42,,,0,0,,-33.5,151.25,100\n";
    const LOCATIONS: &str = "geoname_id,locale_code,continent_code,continent_name,country_iso_code,country_name,subdivision_1_iso_code,subdivision_1_name,subdivision_2_iso_code,subdivision_2_name,city_name,metro_code,time_zone,is_in_european_union\n\
        42,en,OC,Oceania,TL,Testland,,,,,,,Pacific/Testland,0\n";

    fn write_archive(entries: &[(&str, &str)]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let mut zip = ZipWriter::new(file.reopen().expect("reopen"));
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("start entry");
            zip.write_all(content.as_bytes()).expect("write entry");
        }
        zip.finish().expect("finish archive");
        file
    }

    fn store_with_pool(pool: std::sync::Arc<sqlx::SqlitePool>) -> GeoIpStore {
        GeoIpStore::new(pool)
    }

    #[tokio::test]
    async fn test_import_archive_replaces_dataset() {
        let store = store_with_pool(create_test_pool().await);
        let archive = write_archive(&[
            ("GeoLite2-City-CSV_20240101/GeoLite2-City-Locations-en.csv", LOCATIONS),
            ("GeoLite2-City-CSV_20240101/GeoLite2-City-Blocks-IPv4.csv", BLOCKS),
            ("GeoLite2-City-CSV_20240101/README.txt", "not csv"),
        ]);

        let summary = import_archive(&store, archive.path(), CancellationToken::new())
            .await
            .expect("import should succeed");

        assert_eq!(
            summary,
            ImportSummary {
                locales: 1,
                timezones: 1,
                locations: 2,
                blocks: 1,
            }
        );
        let found = store
            .find_address("203.0.113.7", "en")
            .await
            .expect("lookup should succeed")
            .expect("address should be covered");
        assert_eq!(found.locations.len(), 2);
        assert_eq!(found.locations[0].id, 42);
        assert_eq!(found.locations[0].name.as_deref(), Some("Testland"));
        assert_eq!(found.locations[1].name.as_deref(), Some("Oceania"));
        assert_eq!(found.timezone.as_deref(), Some("Pacific/Testland"));
    }

    #[tokio::test]
    async fn test_malformed_network_aborts_and_keeps_previous_dataset() {
        let store = store_with_pool(create_test_pool().await);
        let good = write_archive(&[
            ("GeoLite2-City-Locations-en.csv", LOCATIONS),
            ("GeoLite2-City-Blocks-IPv4.csv", BLOCKS),
        ]);
        import_archive(&store, good.path(), CancellationToken::new())
            .await
            .expect("first import should succeed");

        let bad_blocks = "network,geoname_id\nnot-a-network,42\n";
        let bad = write_archive(&[
            ("GeoLite2-City-Locations-de.csv", LOCATIONS),
            ("GeoLite2-City-Blocks-IPv4.csv", bad_blocks),
        ]);
        let result = import_archive(&store, bad.path(), CancellationToken::new()).await;

        assert!(matches!(result, Err(UpdateError::Codec(_))));
        assert_eq!(store.list_locales().await.expect("locales"), vec!["en"]);
        assert!(store
            .find_address("203.0.113.7", "en")
            .await
            .expect("lookup should succeed")
            .is_some());
    }

    #[tokio::test]
    async fn test_cancelled_import_rolls_back() {
        let store = store_with_pool(create_test_pool().await);
        let archive = write_archive(&[
            ("GeoLite2-City-Locations-en.csv", LOCATIONS),
            ("GeoLite2-City-Blocks-IPv4.csv", BLOCKS),
        ]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = import_archive(&store, archive.path(), cancel).await;

        assert!(matches!(result, Err(UpdateError::Cancelled)));
        assert!(store.list_locales().await.expect("locales").is_empty());
        assert_eq!(store.find_last_update_time().await.expect("time"), None);
    }

    #[tokio::test]
    async fn test_not_a_zip_fails_without_touching_dataset() {
        let store = store_with_pool(create_test_pool().await);
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"definitely not a zip").expect("write");

        let result = import_archive(&store, file.path(), CancellationToken::new()).await;

        assert!(matches!(result, Err(UpdateError::Archive(_))));
        assert_eq!(store.find_last_update_time().await.expect("time"), None);
    }

    #[tokio::test]
    async fn test_run_update_from_upload() {
        let store = store_with_pool(create_test_pool().await);
        let archive = write_archive(&[
            ("GeoLite2-City-Locations-en.csv", LOCATIONS),
            ("GeoLite2-City-Blocks-IPv4.csv", BLOCKS),
        ]);
        let bytes = std::fs::read(archive.path()).expect("read archive");
        let client = crate::initialization::init_download_client().expect("client");

        let summary = run_update(
            &store,
            &client,
            &UpdateConfig::default(),
            ArchiveSource::Upload(Box::new(std::io::Cursor::new(bytes))),
            CancellationToken::new(),
        )
        .await
        .expect("update should succeed");

        assert_eq!(summary.blocks, 1);
        assert!(store.find_last_update_time().await.expect("time").is_some());
    }

    #[tokio::test]
    async fn test_run_update_rejects_oversized_upload() {
        let store = store_with_pool(create_test_pool().await);
        let client = crate::initialization::init_download_client().expect("client");
        let config = UpdateConfig {
            max_archive_size: 8,
            ..UpdateConfig::default()
        };

        let result = run_update(
            &store,
            &client,
            &config,
            ArchiveSource::Upload(Box::new(std::io::Cursor::new(vec![0u8; 9]))),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(UpdateError::ArchiveTooLarge { size: 9, limit: 8 })
        ));
    }
}
