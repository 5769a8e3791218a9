//! Remote key selection
//!
//! Decides whether a listed key belongs to a partition's delta prefix and was
//! produced on the target date. Matching is anchored: the date must appear as
//! a whole `_`/`-` delimited token of the batch directory directly under the
//! delta prefix, e.g.
//!
//! ```text
//! event/tv_viewership/ABC/delta/20240115_001/part0
//! event/tv_viewership/4012/delta/1705300000-1705386399_20240115/part-00000
//! ```

use chrono::{Local, NaiveDate};
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y%m%d";

/// Calendar date in `YYYYMMDD` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDate(NaiveDate);

impl TargetDate {
    /// Parse a `YYYYMMDD` date
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid date '{s}': expected YYYYMMDD"));
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(TargetDate)
            .map_err(|e| format!("invalid date '{s}': {e}"))
    }

    /// Today's date in local time
    pub fn today() -> Self {
        TargetDate(Local::now().date_naive())
    }

    /// Underlying calendar date
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for TargetDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Key filter bound to a base prefix and target date
#[derive(Debug, Clone)]
pub struct KeyFilter {
    base_prefix: String,
    date: TargetDate,
    date_token: String,
}

impl KeyFilter {
    /// Create a filter for `base_prefix` and `date`
    pub fn new(base_prefix: impl Into<String>, date: TargetDate) -> Self {
        let base_prefix = base_prefix.into().trim_end_matches('/').to_string();
        Self {
            base_prefix,
            date,
            date_token: date.to_string(),
        }
    }

    /// Base prefix without trailing slash
    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    /// Target date
    pub fn date(&self) -> TargetDate {
        self.date
    }

    /// Whether `key` belongs to partition `code` and encodes the target date
    pub fn matches(&self, key: &str, code: &str) -> bool {
        key_matches(key, &self.base_prefix, code, &self.date_token)
    }
}

/// Pure matching predicate. Never panics; malformed keys yield `false`.
pub fn key_matches(key: &str, base_prefix: &str, code: &str, date: &str) -> bool {
    if code.is_empty() || date.is_empty() || code.contains('/') {
        return false;
    }

    let rest = match key
        .strip_prefix(base_prefix.trim_end_matches('/'))
        .and_then(|r| r.strip_prefix('/'))
        .and_then(|r| r.strip_prefix(code))
        .and_then(|r| r.strip_prefix("/delta/"))
    {
        Some(rest) => rest,
        None => return false,
    };

    let (batch, object) = match rest.split_once('/') {
        Some(parts) => parts,
        None => return false,
    };

    if object.is_empty()
        || object
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return false;
    }

    batch.split(|c: char| c == '_' || c == '-').any(|token| token == date)
}
