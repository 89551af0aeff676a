//! Partition key codec.
//!
//! Maps rotated log file names of the form `<service>-DD-MM-YYYY-N.log` onto
//! storage keys of the form
//!
//! ```text
//! <environment>/<app_name>/<host_id>/<YYYY-MM-DD>/<service>-<DD>-<MM>-<YYYY>-<N>.log
//! ```
//!
//! and back. The ingest side and the query side both go through this module,
//! so the two always agree on the layout.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CodecError;

/// Delimiter between partition segments.
pub const DELIMITER: char = '/';

/// Sequence value reported for names without a numeric suffix.
///
/// Sorts after every real sequence number.
pub const SEQUENCE_SORT_LAST: u64 = u64::MAX;

/// Suffix of every log file the agent picks up.
pub const LOG_SUFFIX: &str = ".log";

/// Date layout used in storage keys.
const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";

static LOG_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)-([0-9]{2})-([0-9]{2})-([0-9]{4})-([0-9]+)\.log$").unwrap_or_else(|_| unreachable!())
});

static SEQUENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*?-([0-9]+)\.log$").unwrap_or_else(|_| unreachable!()));

/// A file name that matched the rotated log naming pattern.
///
/// The date components are kept exactly as written; they are not yet known
/// to form a valid calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    name: String,
    service: String,
    day: u32,
    month: u32,
    year: i32,
    sequence: u64,
}

impl LogFileName {
    /// The full file name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The `<service>` part before the date.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Day of month as written.
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// Month as written.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Year as written.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Rotation sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Validates the date components.
    pub fn date(&self) -> Result<NaiveDate, CodecError> {
        calendar_date(self.day, self.month, self.year)
    }
}

impl fmt::Display for LogFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Parses a rotated log file name.
///
/// Any name not ending in `-DD-MM-YYYY-N.log` yields [`CodecError::NoMatch`];
/// callers skip such files silently. The date is not validated here.
pub fn parse_file_name(name: &str) -> Result<LogFileName, CodecError> {
    let caps = LOG_FILE_PATTERN
        .captures(name)
        .ok_or_else(|| CodecError::NoMatch(name.to_string()))?;

    let number = |idx: usize| -> Result<u32, CodecError> {
        caps[idx]
            .parse::<u32>()
            .map_err(|_| CodecError::NoMatch(name.to_string()))
    };

    let day = number(2)?;
    let month = number(3)?;
    let year = number(4)? as i32;

    Ok(LogFileName {
        name: name.to_string(),
        service: caps[1].to_string(),
        day,
        month,
        year,
        sequence: caps[5].parse().unwrap_or(SEQUENCE_SORT_LAST),
    })
}

fn calendar_date(day: u32, month: u32, year: i32) -> Result<NaiveDate, CodecError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(CodecError::InvalidDate { day, month, year })
}

/// Converts `DD`, `MM`, `YYYY` into the storage layout `YYYY-MM-DD`.
///
/// Fails with [`CodecError::InvalidDate`] for impossible dates such as
/// `31-02-2024`.
pub fn to_storage_date(day: u32, month: u32, year: i32) -> Result<String, CodecError> {
    calendar_date(day, month, year).map(|d| d.format(STORAGE_DATE_FORMAT).to_string())
}

/// Joins the partition segments into a storage key.
///
/// No escaping is performed: the caller guarantees that none of the leading
/// segments contain [`DELIMITER`].
#[must_use]
pub fn build_key(environment: &str, app_name: &str, host_id: &str, date: &str, file_name: &str) -> String {
    format!("{environment}/{app_name}/{host_id}/{date}/{file_name}")
}

/// Returns the numeric suffix of `<anything>-N.log`, or
/// [`SEQUENCE_SORT_LAST`] when there is none.
#[must_use]
pub fn extract_sequence(file_name: &str) -> u64 {
    SEQUENCE_PATTERN
        .captures(file_name)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(SEQUENCE_SORT_LAST)
}

/// Whether a file name ends in [`LOG_SUFFIX`].
///
/// This is only the cheap pre-filter shared by the watcher and the startup
/// scan; [`parse_file_name`] still decides whether the name is uploadable.
#[must_use]
pub fn has_log_suffix(file_name: &str) -> bool {
    file_name.ends_with(LOG_SUFFIX)
}

/// Returns the last segment of a storage key.
#[must_use]
pub fn file_name_of(key: &str) -> &str {
    key.rsplit_once(DELIMITER).map_or(key, |(_, name)| name)
}

/// Prefix under which every host of an application is partitioned.
#[must_use]
pub fn app_prefix(environment: &str, app_name: &str) -> String {
    format!("{environment}/{app_name}/")
}

/// Prefix holding one host's files for one day.
///
/// `host_prefix` is a common prefix as returned by a delimited listing, i.e.
/// it already ends in [`DELIMITER`].
#[must_use]
pub fn host_date_prefix(host_prefix: &str, date: &str) -> String {
    let mut prefix = String::with_capacity(host_prefix.len() + date.len() + 2);
    prefix.push_str(host_prefix);
    if !prefix.ends_with(DELIMITER) {
        prefix.push(DELIMITER);
    }
    prefix.push_str(date);
    prefix.push(DELIMITER);
    prefix
}

/// A fully resolved storage location for one log file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Deployment environment (`prod`, `staging`, ...).
    pub environment: String,
    /// Application name.
    pub app_name: String,
    /// Identifier of the producing host.
    pub host_id: String,
    /// Calendar date taken from the file name.
    pub date: NaiveDate,
    /// The unchanged local file name.
    pub file_name: String,
}

impl PartitionKey {
    /// Resolves the partition key for a local file name.
    ///
    /// Fails with [`CodecError::NoMatch`] or [`CodecError::InvalidDate`];
    /// both mean the file is skipped.
    pub fn for_file(
        environment: &str,
        app_name: &str,
        host_id: &str,
        file_name: &str,
    ) -> Result<Self, CodecError> {
        let parsed = parse_file_name(file_name)?;
        let date = parsed.date()?;
        Ok(Self {
            environment: environment.to_string(),
            app_name: app_name.to_string(),
            host_id: host_id.to_string(),
            date,
            file_name: parsed.name,
        })
    }

    /// Decodes a storage key produced by [`PartitionKey::to_key`].
    ///
    /// Returns `None` if the key does not have exactly five segments or the
    /// date segment is not `YYYY-MM-DD`.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split(DELIMITER);
        let environment = parts.next()?;
        let app_name = parts.next()?;
        let host_id = parts.next()?;
        let date = parts.next()?;
        let file_name = parts.next()?;
        if parts.next().is_some() || [environment, app_name, host_id, file_name].contains(&"") {
            return None;
        }
        let date = NaiveDate::parse_from_str(date, STORAGE_DATE_FORMAT).ok()?;
        if date.year() < 0 {
            return None;
        }
        Some(Self {
            environment: environment.to_string(),
            app_name: app_name.to_string(),
            host_id: host_id.to_string(),
            date,
            file_name: file_name.to_string(),
        })
    }

    /// The date segment, `YYYY-MM-DD`.
    #[must_use]
    pub fn storage_date(&self) -> String {
        self.date.format(STORAGE_DATE_FORMAT).to_string()
    }

    /// Renders the storage key.
    #[must_use]
    pub fn to_key(&self) -> String {
        build_key(
            &self.environment,
            &self.app_name,
            &self.host_id,
            &self.storage_date(),
            &self.file_name,
        )
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}
