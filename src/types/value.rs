use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

use crate::error::{DbError, DbResult};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const PARSE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// A naive UTC instant with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Reads the wall clock, truncated to milliseconds.
    pub fn now() -> Self {
        Timestamp::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.naive_utc().trunc_subsecs(3))
    }

    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|dt| Timestamp(dt.naive_utc()))
    }

    pub fn epoch_millis(&self) -> i64 {
        self.0.and_utc().timestamp_millis()
    }

    pub fn parse(s: &str) -> DbResult<Self> {
        let s = s.trim();
        for fmt in PARSE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Timestamp(dt.trunc_subsecs(3)));
            }
        }
        Err(DbError::ParseError(format!("invalid timestamp '{}'", s)))
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
    Integer,
    Text,
    Boolean,
    Timestamp,
    Date,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    Timestamp(Timestamp),
    Date(NaiveDate),
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::Null => ColumnType::Null,
            ColumnValue::Integer(_) => ColumnType::Integer,
            ColumnValue::Text(_) => ColumnType::Text,
            ColumnValue::Boolean(_) => ColumnType::Boolean,
            ColumnValue::Timestamp(_) => ColumnType::Timestamp,
            ColumnValue::Date(_) => ColumnType::Date,
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            ColumnValue::Null => "NULL".into(),
            ColumnValue::Integer(i) => i.to_string(),
            ColumnValue::Text(s) => s.clone(),
            ColumnValue::Boolean(b) => b.to_string(),
            ColumnValue::Timestamp(ts) => ts.to_string(),
            ColumnValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}
