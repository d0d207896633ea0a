use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde::Deserialize;

use crate::error::{DbError, DbResult};
use crate::types::Timestamp;

/// Epoch milliseconds at which the coordinator started the current query.
pub const QUERY_TIMESTAMP_KEY: &str = "tempoql.query.timestamp";

/// A single configuration value as it appears in the TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Boolean(bool),
    Text(String),
    Table(BTreeMap<String, SettingValue>),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Integer(i) => write!(f, "{}", i),
            SettingValue::Boolean(b) => write!(f, "{}", b),
            SettingValue::Text(s) => write!(f, "{}", s),
            SettingValue::Table(t) => write!(f, "<table of {} entries>", t.len()),
        }
    }
}

/// Flat key/value job configuration shipped from the coordinator to workers.
/// Nested TOML tables are flattened into dotted keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobConf {
    settings: HashMap<String, SettingValue>,
}

impl JobConf {
    pub fn new() -> Self {
        JobConf::default()
    }

    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let conf = JobConf::parse(&text)?;
        debug!("loaded {} settings from {}", conf.settings.len(), path.as_ref().display());
        Ok(conf)
    }

    pub fn parse(text: &str) -> DbResult<Self> {
        let table: BTreeMap<String, SettingValue> = toml::from_str(text)
            .map_err(|e| DbError::ParseError(format!("invalid configuration: {}", e)))?;
        let mut conf = JobConf::new();
        conf.flatten_into("", table);
        Ok(conf)
    }

    fn flatten_into(&mut self, prefix: &str, table: BTreeMap<String, SettingValue>) {
        for (key, value) in table {
            let key = if prefix.is_empty() { key } else { format!("{}.{}", prefix, key) };
            match value {
                SettingValue::Table(inner) => self.flatten_into(&key, inner),
                leaf => {
                    self.settings.insert(key, leaf);
                }
            }
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.settings.insert(key.to_string(), SettingValue::Text(value.to_string()));
    }

    pub fn set_long(&mut self, key: &str, value: i64) {
        self.settings.insert(key.to_string(), SettingValue::Integer(value));
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.settings.get(key) {
            Some(SettingValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns `Ok(None)` when the key is absent and `InvalidSetting` when the
    /// stored value is neither an integer nor a string holding one.
    pub fn get_long_setting(&self, key: &str) -> DbResult<Option<i64>> {
        let invalid = |value: &SettingValue| DbError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
        };
        match self.settings.get(key) {
            None => Ok(None),
            Some(SettingValue::Integer(i)) => Ok(Some(*i)),
            Some(v @ SettingValue::Text(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid(v)),
            Some(other) => Err(invalid(other)),
        }
    }

    /// The query start instant propagated by the coordinator, if any.
    pub fn query_timestamp(&self) -> DbResult<Option<Timestamp>> {
        match self.get_long_setting(QUERY_TIMESTAMP_KEY)? {
            None => Ok(None),
            Some(millis) => Timestamp::from_epoch_millis(millis).map(Some).ok_or_else(|| {
                DbError::InvalidSetting {
                    key: QUERY_TIMESTAMP_KEY.to_string(),
                    value: millis.to_string(),
                }
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

/// Environment handed to function nodes running inside a job.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    conf: Arc<JobConf>,
}

impl ExecutionContext {
    pub fn new(conf: JobConf) -> Self {
        ExecutionContext { conf: Arc::new(conf) }
    }

    pub fn job_conf(&self) -> Arc<JobConf> {
        Arc::clone(&self.conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_keys_and_comments() {
        let conf = JobConf::parse(
            "# worker conf\n\ntempoql.query.timestamp = 1704067200000 # start\nname = \"etl\"\n",
        )
        .unwrap();
        assert_eq!(conf.len(), 2);
        assert_eq!(conf.get_str("name"), Some("etl"));
        assert_eq!(conf.get(QUERY_TIMESTAMP_KEY), Some(&SettingValue::Integer(1_704_067_200_000)));
        assert_eq!(
            conf.query_timestamp().unwrap().unwrap().to_string(),
            "2024-01-01 00:00:00.000"
        );
    }

    #[test]
    fn quoted_integer_is_accepted() {
        let conf = JobConf::parse("tempoql.query.timestamp = \"1704067200000\"").unwrap();
        assert_eq!(conf.get_long_setting(QUERY_TIMESTAMP_KEY).unwrap(), Some(1_704_067_200_000));
    }

    #[test]
    fn nested_tables_flatten() {
        let conf = JobConf::parse("[tempoql.query]\ntimestamp = 0\n[job]\nspeculative = true\n").unwrap();
        assert_eq!(conf.get_long_setting(QUERY_TIMESTAMP_KEY).unwrap(), Some(0));
        assert_eq!(conf.get("job.speculative"), Some(&SettingValue::Boolean(true)));
    }

    #[test]
    fn missing_key_is_none() {
        let conf = JobConf::new();
        assert!(conf.is_empty());
        assert_eq!(conf.get_long_setting(QUERY_TIMESTAMP_KEY).unwrap(), None);
        assert_eq!(conf.query_timestamp().unwrap(), None);
    }

    #[test]
    fn rejects_non_integer_timestamp() {
        let mut conf = JobConf::new();
        conf.set(QUERY_TIMESTAMP_KEY, "noon");
        assert!(matches!(conf.query_timestamp(), Err(DbError::InvalidSetting { .. })));
        conf.set_long(QUERY_TIMESTAMP_KEY, i64::MAX);
        assert!(matches!(conf.query_timestamp(), Err(DbError::InvalidSetting { .. })));
        let conf = JobConf::parse("tempoql.query.timestamp = false").unwrap();
        assert!(matches!(conf.query_timestamp(), Err(DbError::InvalidSetting { .. })));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = JobConf::parse("a = 1\nbroken\n").unwrap_err();
        assert!(matches!(err, DbError::ParseError(_)));
        assert!(matches!(JobConf::parse("ratio = 0.5"), Err(DbError::ParseError(_))));
    }
}
