//! Loads ticks from the engine's text tick-file format: `bid,ask,datetime`, one row per
//! line, no header.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::feed::error::FeedError;
use crate::feed::filter::TickFilter;
use crate::feed::memory::MemoryTickFeed;
use crate::tick::{Frequency, Tick};

/// Default datetime format used by the reference text-feed loader.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Configuration for loading one or more instruments' ticks from text files.
#[derive(Debug, Clone, Deserialize)]
pub struct TextFeedConfig {
    /// Base directory that per-instrument files are resolved against by
    /// [`load_instruments_into_feed`]. Unused by [`load_ticks_from_path`], which always
    /// takes an explicit path.
    #[serde(default)]
    pub data_directory: Option<PathBuf>,
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,
    #[serde(default)]
    pub skip_malformed: bool,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
}

fn default_datetime_format() -> String {
    DEFAULT_DATETIME_FORMAT.to_string()
}

fn default_frequency() -> Frequency {
    Frequency::Minute
}

impl Default for TextFeedConfig {
    fn default() -> Self {
        Self {
            data_directory: None,
            datetime_format: default_datetime_format(),
            skip_malformed: false,
            frequency: default_frequency(),
        }
    }
}

/// Parses one `bid,ask,datetime` row into a [`Tick`].
fn parse_row(row: &csv::StringRecord, format: &str, frequency: Frequency) -> Result<Tick, FeedError> {
    let malformed = || FeedError::MalformedRow(row.iter().collect::<Vec<_>>().join(","));

    let bid: Decimal = row.get(0).ok_or_else(malformed)?.trim().parse().map_err(|_| malformed())?;
    let ask: Decimal = row.get(1).ok_or_else(malformed)?.trim().parse().map_err(|_| malformed())?;
    let raw_datetime = row.get(2).ok_or_else(malformed)?.trim();

    let naive = NaiveDateTime::parse_from_str(raw_datetime, format).map_err(|_| malformed())?;
    let datetime = Utc.from_utc_datetime(&naive);

    Ok(Tick::new(datetime, bid, ask, frequency))
}

/// Loads every row of `path`, applying `config` and the optional `filter`.
///
/// A malformed row aborts loading unless `config.skip_malformed` is set, in which case it
/// is dropped and logged at debug.
pub fn load_ticks_from_path(
    path: impl AsRef<Path>,
    config: &TextFeedConfig,
    filter: Option<&dyn TickFilter>,
) -> Result<Vec<Tick>, FeedError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .from_path(path)
        .map_err(FeedError::Csv)?;

    let mut ticks = Vec::new();
    for record in reader.records() {
        let record = record.map_err(FeedError::Csv)?;
        match parse_row(&record, &config.datetime_format, config.frequency) {
            Ok(tick) => {
                if filter.map(|f| f.include(tick.datetime())).unwrap_or(true) {
                    ticks.push(tick);
                }
            }
            Err(err) if config.skip_malformed => {
                tracing::debug!(path = %path.display(), error = %err, "skipping malformed tick row");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(ticks)
}

/// Loads each of `instruments` from `{config.data_directory}/{instrument}.csv` and
/// registers it with `feed`, mirroring the reference loader's one-file-per-instrument
/// convention.
pub fn load_instruments_into_feed(
    feed: &mut MemoryTickFeed,
    instruments: &[&str],
    config: &TextFeedConfig,
    filter: Option<&dyn TickFilter>,
) -> Result<(), FeedError> {
    let data_directory = config
        .data_directory
        .as_deref()
        .ok_or(FeedError::MissingDataDirectory)?;

    for instrument in instruments {
        let path = data_directory.join(format!("{instrument}.csv"));
        let ticks = load_ticks_from_path(&path, config, filter)?;
        feed.add_ticks(instrument, ticks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn should_parse_well_formed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "10.0,10.1,2024.01.01 09:30:00\n11.0,11.1,2024.01.01 09:31:00\n"
        )
        .unwrap();
        let config = TextFeedConfig::default();

        let ticks = load_ticks_from_path(file.path(), &config, None).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].bid(), dec!(10.0));
        assert_eq!(ticks[1].ask(), dec!(11.1));
    }

    #[test]
    fn should_abort_on_malformed_row_by_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not-a-number,10.1,2024.01.01 09:30:00\n").unwrap();
        let config = TextFeedConfig::default();

        assert!(load_ticks_from_path(file.path(), &config, None).is_err());
    }

    #[test]
    fn should_skip_malformed_row_when_configured() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "not-a-number,10.1,2024.01.01 09:30:00\n10.0,10.1,2024.01.01 09:31:00\n"
        )
        .unwrap();
        let config = TextFeedConfig {
            skip_malformed: true,
            ..TextFeedConfig::default()
        };

        let ticks = load_ticks_from_path(file.path(), &config, None).unwrap();
        assert_eq!(ticks.len(), 1);
    }

    #[test]
    fn load_instruments_into_feed_reads_one_file_per_instrument() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AAA.csv"), "10.0,10.1,2024.01.01 09:30:00\n").unwrap();
        std::fs::write(dir.path().join("BBB.csv"), "20.0,20.1,2024.01.01 09:30:00\n").unwrap();

        let config = TextFeedConfig {
            data_directory: Some(dir.path().to_path_buf()),
            ..TextFeedConfig::default()
        };
        let mut feed = MemoryTickFeed::new(config.frequency);

        load_instruments_into_feed(&mut feed, &["AAA", "BBB"], &config, None).unwrap();

        let batch = feed.next_ticks().unwrap().unwrap();
        assert!(batch.contains("AAA"));
        assert!(batch.contains("BBB"));
    }

    #[test]
    fn load_instruments_into_feed_requires_data_directory() {
        let mut feed = MemoryTickFeed::new(Frequency::Minute);
        let config = TextFeedConfig::default();

        assert!(matches!(
            load_instruments_into_feed(&mut feed, &["AAA"], &config, None),
            Err(FeedError::MissingDataDirectory)
        ));
    }
}
