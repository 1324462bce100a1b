//! ZIP archive reader.
//!
//! Runs on a blocking thread. Entries are handed to the async side over a
//! bounded channel as they are met; block rows are streamed through a second
//! bounded channel per entry, so at most one batch of decoded rows is held in
//! memory. Location entries are folded into a hierarchy first, since parents
//! must be known before any location can be written.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::config::INSERT_BATCH_SIZE;
use crate::error_handling::{ImportStats, RowDefect, UpdateError};
use crate::geoip::AddressBlock;
use crate::tabular::TabularDecoder;

use super::hierarchy::{HierarchyResult, LocationTree};
use super::models::{MaxMindBlock, MaxMindLocation};

/// What an archive entry holds, derived from its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// `*-*-Blocks-<subtype>.csv`, subtype being e.g. `IPv4`.
    Blocks { subtype: String },
    /// `*-*-Locations-<locale>.csv`.
    Locations { locale: String },
    /// A CSV file with a data type this reader does not know.
    Unsupported { data_type: String },
}

/// Classifies an archive entry by name.
///
/// The file name (directories stripped) must end in `.csv` and split into
/// `<prefix>-<prefix>-<type>-<subtype>`; anything else yields `None`.
pub fn classify_entry(entry_name: &str) -> Option<EntryKind> {
    let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);
    if !file_name.to_ascii_lowercase().ends_with(".csv") {
        return None;
    }
    let stem = &file_name[..file_name.len() - 4];
    let parts: Vec<&str> = stem.splitn(4, '-').collect();
    let [_, _, data_type, subtype] = parts[..] else {
        return None;
    };
    Some(match data_type {
        "Blocks" => EntryKind::Blocks {
            subtype: subtype.to_string(),
        },
        "Locations" => EntryKind::Locations {
            locale: subtype.to_string(),
        },
        other => EntryKind::Unsupported {
            data_type: other.to_string(),
        },
    })
}

/// A decoded archive entry, ready for insertion.
#[derive(Debug)]
pub enum ArchiveEntry {
    /// Block rows, streamed while the entry is being read. The stream ends
    /// early when the reader is cancelled or fails.
    Blocks {
        name: String,
        subtype: String,
        rows: mpsc::Receiver<AddressBlock>,
    },
    /// The location forest of one locale.
    Locations {
        name: String,
        locale: String,
        hierarchy: HierarchyResult,
    },
}

/// Reads every recognized entry of the archive at `path` into `sink`.
///
/// Must run outside the async runtime (e.g. in `spawn_blocking`). Stops
/// quietly when `cancel` fires or the receiving side goes away. A malformed
/// network, an I/O failure or a broken archive aborts with an error; the
/// entry being streamed ends at that point.
pub fn read_archive(
    path: &Path,
    sink: mpsc::Sender<ArchiveEntry>,
    cancel: CancellationToken,
    stats: Arc<ImportStats>,
) -> Result<(), UpdateError> {
    info!("Using archive file {}", path.display());
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            info!("Archive reading cancelled");
            break;
        }
        let entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        info!("Found: {}", name);
        if entry.is_dir() {
            continue;
        }

        let delivered = match classify_entry(&name) {
            None => {
                debug!("Ignoring entry {}", name);
                true
            }
            Some(EntryKind::Unsupported { data_type }) => {
                warn!("Unsupported data type: {} ({})", data_type, name);
                stats.record(RowDefect::SkippedEntry);
                true
            }
            Some(EntryKind::Blocks { subtype }) => {
                info!("Processing: {}", name);
                send_blocks(entry, name, subtype, &sink, &cancel, &stats)?
            }
            Some(EntryKind::Locations { locale }) => {
                info!("Processing: {}", name);
                send_locations(entry, name, locale, &sink, &cancel, &stats)?
            }
        };
        if !delivered {
            debug!("Archive consumer went away, stopping");
            break;
        }
    }
    info!("Closing archive");
    Ok(())
}

/// Streams the block rows of one entry. Returns `false` once the consumer is
/// gone.
fn send_blocks(
    entry: impl Read,
    name: String,
    subtype: String,
    sink: &mpsc::Sender<ArchiveEntry>,
    cancel: &CancellationToken,
    stats: &Arc<ImportStats>,
) -> Result<bool, UpdateError> {
    let (rows, receiver) = mpsc::channel(INSERT_BATCH_SIZE);
    let announced = ArchiveEntry::Blocks {
        name,
        subtype: subtype.clone(),
        rows: receiver,
    };
    if sink.blocking_send(announced).is_err() {
        return Ok(false);
    }

    let Some(decoder) =
        TabularDecoder::<MaxMindBlock, _>::from_reader(BufReader::new(entry), stats.clone())?
    else {
        warn!("Empty {} blocks file", subtype);
        return Ok(true);
    };

    let mut parsed = 0usize;
    for row in decoder {
        if cancel.is_cancelled() {
            break;
        }
        let block = AddressBlock::try_from(row?)?;
        if rows.blocking_send(block).is_err() {
            debug!("Block consumer for {} went away", subtype);
            break;
        }
        parsed += 1;
    }
    info!("Finished parsing {} {} blocks", parsed, subtype);
    Ok(true)
}

/// Folds the location rows of one entry and hands the result over. Returns
/// `false` once the consumer is gone.
fn send_locations(
    entry: impl Read,
    name: String,
    locale: String,
    sink: &mpsc::Sender<ArchiveEntry>,
    cancel: &CancellationToken,
    stats: &Arc<ImportStats>,
) -> Result<bool, UpdateError> {
    let mut tree = LocationTree::new(locale.clone());
    if let Some(decoder) =
        TabularDecoder::<MaxMindLocation, _>::from_reader(BufReader::new(entry), stats.clone())?
    {
        for row in decoder {
            if cancel.is_cancelled() {
                return Ok(true);
            }
            let row = row?;
            let geoname_id = row.geoname_id;
            if !tree.accumulate(row) {
                warn!(
                    "Skipping {} location {:?} without any level data",
                    locale, geoname_id
                );
                stats.record(RowDefect::EmptyLocation);
            }
        }
    }

    if tree.is_empty() {
        warn!("No {} locations in {}", locale, name);
    } else {
        debug!("Folded {} into {} location nodes", name, tree.len());
    }
    let hierarchy = tree.finish();
    info!(
        "Parsed {} locations and {} timezones",
        hierarchy.locations.len(),
        hierarchy.timezones.len()
    );
    Ok(sink
        .blocking_send(ArchiveEntry::Locations {
            name,
            locale,
            hierarchy,
        })
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_archive(entries: &[(&str, &str)]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let mut writer = zip::ZipWriter::new(file.reopen().expect("reopen"));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(body.as_bytes()).expect("write entry");
        }
        writer.finish().expect("finish archive");
        file
    }

    /// Drains the reader's output on the current thread.
    fn read_all(
        path: &Path,
        cancel: CancellationToken,
    ) -> (Vec<(String, usize)>, Result<(), UpdateError>, Arc<ImportStats>) {
        let stats = Arc::new(ImportStats::new());
        let (sink, mut entries) = mpsc::channel(1);
        let path = path.to_path_buf();
        let reader_stats = stats.clone();
        let reader =
            std::thread::spawn(move || read_archive(&path, sink, cancel, reader_stats));

        let mut seen = Vec::new();
        while let Some(entry) = entries.blocking_recv() {
            match entry {
                ArchiveEntry::Blocks { subtype, mut rows, .. } => {
                    let mut count = 0;
                    while rows.blocking_recv().is_some() {
                        count += 1;
                    }
                    seen.push((format!("Blocks-{}", subtype), count));
                }
                ArchiveEntry::Locations {
                    locale, hierarchy, ..
                } => seen.push((format!("Locations-{}", locale), hierarchy.locations.len())),
            }
        }
        let result = reader.join().expect("reader thread");
        (seen, result, stats)
    }

    #[test]
    fn test_classify_entry() {
        assert_eq!(
            classify_entry("GeoLite2-City-CSV_20240102/GeoLite2-City-Blocks-IPv4.csv"),
            Some(EntryKind::Blocks {
                subtype: "IPv4".to_string()
            })
        );
        assert_eq!(
            classify_entry("GeoLite2-Country-Locations-zh-CN.csv"),
            Some(EntryKind::Locations {
                locale: "zh-CN".to_string()
            })
        );
        assert_eq!(
            classify_entry("GeoLite2-City-Other-x.CSV"),
            Some(EntryKind::Unsupported {
                data_type: "Other".to_string()
            })
        );
        assert_eq!(classify_entry("GeoLite2-City-CSV_20240102/LICENSE.txt"), None);
        assert_eq!(classify_entry("COPYRIGHT.csv"), None);
        assert_eq!(classify_entry("GeoLite2-Blocks.csv"), None);
    }

    #[test]
    fn test_reads_blocks_and_locations() {
        let archive = write_archive(&[
            ("db/README.txt", "ignored"),
            (
                "db/GeoLite2-Country-Blocks-IPv4.csv",
                "network,geoname_id\n203.0.113.0/24,42\n198.51.100.0/24,42\n",
            ),
            (
                "db/GeoLite2-Country-Locations-en.csv",
                "geoname_id,locale_code,continent_code,continent_name,country_iso_code,country_name\n\
                 42,en,OC,Oceania,TL,Testland\n",
            ),
            ("db/GeoLite2-Country-Extra-en.csv", "a\n1\n"),
        ]);

        let (seen, result, stats) = read_all(archive.path(), CancellationToken::new());
        result.expect("archive reads cleanly");
        assert_eq!(
            seen,
            vec![
                ("Blocks-IPv4".to_string(), 2),
                ("Locations-en".to_string(), 2),
            ]
        );
        assert_eq!(stats.count(RowDefect::SkippedEntry), 1);
    }

    #[test]
    fn test_malformed_network_aborts() {
        let archive = write_archive(&[(
            "GeoLite2-Country-Blocks-IPv4.csv",
            "network,geoname_id\n203.0.113.0/24,42\nnot-a-network,42\n",
        )]);

        let (seen, result, _) = read_all(archive.path(), CancellationToken::new());
        assert!(matches!(result, Err(UpdateError::Codec(_))));
        assert_eq!(seen, vec![("Blocks-IPv4".to_string(), 1)]);
    }

    #[test]
    fn test_empty_location_rows_are_skipped() {
        let archive = write_archive(&[(
            "GeoLite2-Country-Locations-en.csv",
            "geoname_id,locale_code,country_name\n1,en,\n2,en,Testland\n",
        )]);

        let (seen, result, stats) = read_all(archive.path(), CancellationToken::new());
        result.expect("archive reads cleanly");
        assert_eq!(seen, vec![("Locations-en".to_string(), 1)]);
        assert_eq!(stats.count(RowDefect::EmptyLocation), 1);
    }

    #[test]
    fn test_cancelled_reader_emits_nothing() {
        let archive = write_archive(&[(
            "GeoLite2-Country-Blocks-IPv4.csv",
            "network,geoname_id\n203.0.113.0/24,42\n",
        )]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (seen, result, _) = read_all(archive.path(), cancel);
        result.expect("cancellation is not an error");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_not_a_zip_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"definitely not a zip").expect("write");
        let (_, result, _) = read_all(file.path(), CancellationToken::new());
        assert!(matches!(result, Err(UpdateError::Archive(_))));
    }
}
