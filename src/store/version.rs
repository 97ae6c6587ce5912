//! TVC codes: sortable date+version prefixes for cache keys.
//!
//! A TVC packs (calendar date, "major.minor" version) into a single integer,
//! radix-20 encodes it, and left-pads to a fixed 10-symbol width. Because
//! the alphabet ascends and the width is fixed, lexicographic order on TVC
//! strings tracks chronological order, which is the property the store
//! relies on for automatic daily cache busting.
//!
//! Decimal packing layout: `year·10⁸ + month·10⁶ + day·10⁴ + major·10³ + minor`.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::base20::{self, Base20Error};

/// Fixed width of every TVC code in symbols.
pub const TVC_WIDTH: usize = 10;

/// Truncated content hash length in hex characters.
pub const HASH_WIDTH: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyFormatError {
    #[error(transparent)]
    Base20(#[from] Base20Error),

    #[error("TVC code {0:?} is not {TVC_WIDTH} symbols wide")]
    BadWidth(String),

    #[error("TVC decodes to invalid calendar date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("year {0} does not fit the 4-digit packing field")]
    YearOutOfRange(i32),

    #[error("version string {0:?} is not \"major.minor\" with major ≤ 99 and minor ≤ 999")]
    InvalidVersion(String),

    #[error("cache key {0:?} does not have namespace, TVC, and hash segments")]
    MalformedKey(String),
}

/// A validated "major.minor" cache format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// Parse "major.minor"; a missing minor component defaults to 0.
    pub fn parse(version: &str) -> Result<Self, KeyFormatError> {
        let invalid = || KeyFormatError::InvalidVersion(version.to_string());

        let mut parts = version.splitn(2, '.');
        let major: u32 = parts
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)?;
        let minor: u32 = match parts.next() {
            Some(s) => s.parse().map_err(|_| invalid())?,
            None => 0,
        };

        if major > 99 || minor > 999 {
            return Err(invalid());
        }
        Ok(Self { major, minor })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// The fields recovered from a parsed TVC code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvcInfo {
    pub date: NaiveDate,
    pub version: Version,
}

/// A cache key split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyParts {
    pub namespace: String,
    pub tvc: String,
    pub hash: String,
    pub info: TvcInfo,
}

/// Pack a date and version into a 10-symbol TVC code.
pub fn generate_tvc(date: NaiveDate, version: &str) -> Result<String, KeyFormatError> {
    let version = Version::parse(version)?;
    encode_tvc(date, version)
}

/// Pack a date and an already-validated version into a TVC code.
pub fn encode_tvc(date: NaiveDate, version: Version) -> Result<String, KeyFormatError> {
    let year = date.year();
    if !(0..=9999).contains(&year) {
        return Err(KeyFormatError::YearOutOfRange(year));
    }

    let packed = year as u64 * 100_000_000
        + date.month() as u64 * 1_000_000
        + date.day() as u64 * 10_000
        + version.major as u64 * 1_000
        + version.minor as u64;

    Ok(base20::pad_left(&base20::encode(packed), TVC_WIDTH))
}

/// Unpack a 10-symbol TVC code back into date and version.
pub fn parse_tvc(code: &str) -> Result<TvcInfo, KeyFormatError> {
    if code.chars().count() != TVC_WIDTH {
        return Err(KeyFormatError::BadWidth(code.to_string()));
    }

    let mut packed = base20::decode(code)?;
    let minor = (packed % 1_000) as u32;
    packed /= 1_000;
    let major = (packed % 100) as u32;
    packed /= 100;
    let day = (packed % 100) as u32;
    packed /= 100;
    let month = (packed % 100) as u32;
    let year = (packed / 100) as i32;

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(KeyFormatError::InvalidDate { year, month, day })?;

    Ok(TvcInfo {
        date,
        version: Version { major, minor },
    })
}

/// Assemble the versioned suffix `{tvc}-{hash}` of a cache key.
pub fn versioned_suffix(tvc: &str, hash: &str) -> String {
    format!("{tvc}-{hash}")
}

/// Assemble a full cache key `{namespace}-{tvc}-{hash}`.
pub fn assemble_cache_key(namespace: &str, tvc: &str, hash: &str) -> String {
    format!("{namespace}-{}", versioned_suffix(tvc, hash))
}

/// Split a store-produced cache key back into its segments.
///
/// Splits from the right: the hash is the last dash-separated segment, the
/// TVC the second-to-last, and the namespace everything before, so a
/// namespace containing dashes still parses correctly.
pub fn parse_cache_key(key: &str) -> Result<CacheKeyParts, KeyFormatError> {
    let malformed = || KeyFormatError::MalformedKey(key.to_string());

    let (rest, hash) = key.rsplit_once('-').ok_or_else(malformed)?;
    let (namespace, tvc) = rest.rsplit_once('-').ok_or_else(malformed)?;
    if namespace.is_empty() || hash.is_empty() {
        return Err(malformed());
    }

    let info = parse_tvc(tvc)?;
    Ok(CacheKeyParts {
        namespace: namespace.to_string(),
        tvc: tvc.to_string(),
        hash: hash.to_string(),
        info,
    })
}
