use log::debug;

use crate::config::{JobConf, QUERY_TIMESTAMP_KEY};
use crate::types::Timestamp;

/// Per-connection session. The query start timestamp is fixed by
/// `begin_query` and shared by every query-scoped function in that query.
#[derive(Debug, Clone)]
pub struct SessionState {
    query_current_timestamp: Timestamp,
    queries_started: u64,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState { query_current_timestamp: Timestamp::now(), queries_started: 0 }
    }

    /// Marks the start of a new query and reads the wall clock once.
    pub fn begin_query(&mut self) -> Timestamp {
        self.begin_query_at(Timestamp::now())
    }

    pub fn begin_query_at(&mut self, ts: Timestamp) -> Timestamp {
        self.queries_started += 1;
        self.query_current_timestamp = ts;
        debug!("query #{} starts at {}", self.queries_started, ts);
        ts
    }

    pub fn query_current_timestamp(&self) -> Timestamp {
        self.query_current_timestamp
    }

    pub fn queries_started(&self) -> u64 {
        self.queries_started
    }

    /// Ships the query start to worker configuration so that session-less
    /// fragments resolve the same instant.
    pub fn propagate_query_timestamp(&self, conf: &mut JobConf) {
        conf.set_long(QUERY_TIMESTAMP_KEY, self.query_current_timestamp.epoch_millis());
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new()
    }
}
