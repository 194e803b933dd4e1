use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::key::QueryKey;
use super::query_cache::CachedData;

/// Persisted form of the query cache.
///
/// ```text
/// { "buster": "<version>", "timestamp": "<rfc3339>",
///   "queries": [ { "key": {...}, "data": {...}, "data_updated_at": "<rfc3339>" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCache {
    pub buster: String,
    pub timestamp: DateTime<Utc>,
    pub queries: Vec<PersistedQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedQuery {
    pub key: QueryKey,
    pub data: CachedData,
    pub data_updated_at: DateTime<Utc>,
}

impl PersistedCache {
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize cache: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Deserialization(format!("Failed to parse persisted cache: {e}")))
    }

    /// Whether the snapshot as a whole may be restored.
    pub fn is_usable(&self, buster: &str, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        self.buster == buster && now - self.timestamp <= max_age
    }

    /// Drop entries whose data is older than `max_age`. Returns how many were dropped.
    pub fn prune(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) -> usize {
        let before = self.queries.len();
        self.queries.retain(|q| now - q.data_updated_at <= max_age);
        before - self.queries.len()
    }
}
