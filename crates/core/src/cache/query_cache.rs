use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::errors::CoreError;
use crate::models::holding::HoldingsResponse;
use crate::models::portfolio::Portfolio;

use super::key::QueryKey;
use super::snapshot::{PersistedCache, PersistedQuery};
use super::store::CacheStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A successful read result, one variant per resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CachedData {
    Portfolios(Vec<Portfolio>),
    Holdings(HoldingsResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing fetched yet.
    Loading,
    /// The latest fetch failed.
    Error,
    Success,
}

/// Everything the cache knows about one key.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub data: Option<CachedData>,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub error_updated_at: Option<DateTime<Utc>>,
    pub is_fetching: bool,
    pub invalidated: bool,
    observers: usize,
    generation: u64,
}

impl QueryState {
    pub fn status(&self) -> QueryStatus {
        if self.error.is_some() {
            QueryStatus::Error
        } else if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Loading
        }
    }

    pub fn portfolios(&self) -> Option<&[Portfolio]> {
        match &self.data {
            Some(CachedData::Portfolios(list)) => Some(list),
            _ => None,
        }
    }

    pub fn holdings(&self) -> Option<&HoldingsResponse> {
        match &self.data {
            Some(CachedData::Holdings(response)) => Some(response),
            _ => None,
        }
    }

    pub fn observers(&self) -> usize {
        self.observers
    }

    /// Latest fetch attempt, successful or not.
    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        match (self.data_updated_at, self.error_updated_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Proof that a fetch was started; handed back on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Updated,
    Errored,
    Invalidated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

/// Client-side store of server data, keyed by [`QueryKey`].
///
/// Reads are synchronous. Fetching happens outside the cache in two steps,
/// [`begin_fetch`](Self::begin_fetch) and [`complete_fetch`](Self::complete_fetch),
/// so a result that arrives after an invalidation of its key is dropped
/// instead of overwriting newer server state. Data is never patched
/// locally; mutations invalidate and the next fetch brings the truth.
#[derive(Debug)]
pub struct QueryCache {
    entries: HashMap<QueryKey, QueryState>,
    open_market_interval: Duration,
    closed_market_interval: Duration,
    max_age: Duration,
    events: broadcast::Sender<CacheEvent>,
}

impl QueryCache {
    pub fn new(config: &ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: HashMap::new(),
            open_market_interval: config.open_market_poll_interval,
            closed_market_interval: config.closed_market_poll_interval,
            max_age: config.cache_max_age,
            events,
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn get(&self, key: &QueryKey) -> Option<&QueryState> {
        self.entries.get(key)
    }

    pub fn portfolios(&self) -> Option<&[Portfolio]> {
        self.get(&QueryKey::Portfolios)?.portfolios()
    }

    pub fn holdings(&self, portfolio_id: &str) -> Option<&HoldingsResponse> {
        self.get(&QueryKey::holdings(portfolio_id))?.holdings()
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Receive a [`CacheEvent`] for every change to any key.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Register a view as interested in `key`.
    ///
    /// Data is stale as soon as it arrives, so every mount asks for a
    /// background revalidation. Returns `true` when the caller should start
    /// one (i.e. none is already in flight).
    pub fn mount(&mut self, key: &QueryKey) -> bool {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.observers += 1;
        entry.invalidated = true;
        !entry.is_fetching
    }

    pub fn unmount(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    // ── Fetch protocol ──────────────────────────────────────────────

    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchTicket {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.is_fetching = true;
        FetchTicket {
            key: key.clone(),
            generation: entry.generation,
        }
    }

    /// Store the outcome of a fetch. Returns `false` when the result was
    /// discarded because the key was invalidated, removed or unmounted while
    /// the request was in flight.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<CachedData, CoreError>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            debug!("Dropping result for removed query {}", ticket.key);
            return false;
        };
        if entry.generation != ticket.generation {
            debug!("Dropping stale result for {}", ticket.key);
            return false;
        }
        entry.is_fetching = false;
        if entry.observers == 0 {
            debug!("Dropping result for unmounted query {}", ticket.key);
            return false;
        }

        entry.invalidated = false;
        let kind = match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.data_updated_at = Some(now);
                entry.error = None;
                entry.error_updated_at = None;
                CacheEventKind::Updated
            }
            Err(e) => {
                warn!("Fetching {} failed: {e}", ticket.key);
                entry.error = Some(e.to_string());
                entry.error_updated_at = Some(now);
                CacheEventKind::Errored
            }
        };
        self.emit(ticket.key, kind);
        true
    }

    // ── Invalidation ────────────────────────────────────────────────

    /// Mark `key` stale so the next poll refetches it. Any fetch already in
    /// flight for the key is abandoned.
    pub fn invalidate(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.invalidated = true;
            entry.is_fetching = false;
            entry.generation += 1;
        }
        debug!("Invalidated {key}");
        self.emit(key.clone(), CacheEventKind::Invalidated);
    }

    /// Invalidate every cached key matching `predicate`.
    pub fn invalidate_where(&mut self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let keys: Vec<QueryKey> = self.keys().into_iter().filter(|k| predicate(k)).collect();
        for key in &keys {
            self.invalidate(key);
        }
        keys.len()
    }

    pub fn remove(&mut self, key: &QueryKey) -> Option<QueryState> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.emit(key.clone(), CacheEventKind::Removed);
        }
        removed
    }

    // ── Polling ─────────────────────────────────────────────────────

    /// Refetch interval for `key`, evaluated against its latest data.
    pub fn refetch_interval(&self, key: &QueryKey) -> Option<Duration> {
        match key {
            QueryKey::Portfolios => None,
            QueryKey::Holdings { .. } => {
                let market_open = self
                    .get(key)
                    .and_then(QueryState::holdings)
                    .is_some_and(|h| h.is_market_open);
                Some(if market_open {
                    self.open_market_interval
                } else {
                    self.closed_market_interval
                })
            }
        }
    }

    /// When `key` should next be fetched. `DateTime::MIN_UTC` means "now".
    /// `None` for unmounted keys, keys already fetching, and keys that do not poll
    /// and are fresh.
    pub fn next_refetch_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        let entry = self.get(key)?;
        if entry.observers == 0 || entry.is_fetching {
            return None;
        }
        let Some(last) = entry.last_attempt_at() else {
            return Some(DateTime::<Utc>::MIN_UTC);
        };
        if entry.invalidated {
            return Some(DateTime::<Utc>::MIN_UTC);
        }
        self.refetch_interval(key)
            .map(|interval| last + to_chrono(interval))
    }

    /// Mounted keys whose refetch time has come, in key order.
    pub fn due_keys(&self, now: DateTime<Utc>) -> Vec<QueryKey> {
        self.keys()
            .into_iter()
            .filter(|k| self.next_refetch_at(k).is_some_and(|at| at <= now))
            .collect()
    }

    /// Earliest upcoming refetch across all mounted keys.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.entries
            .keys()
            .filter_map(|k| self.next_refetch_at(k))
            .min()
    }

    // ── Retention & persistence ─────────────────────────────────────

    /// Evict unobserved entries whose latest data is older than the max age.
    pub fn gc(&mut self, now: DateTime<Utc>) -> usize {
        let max_age = to_chrono(self.max_age);
        let expired: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.observers == 0
                    && !e.is_fetching
                    && e.last_attempt_at().map_or(true, |at| now - at > max_age)
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub fn snapshot(&self, buster: &str, now: DateTime<Utc>) -> PersistedCache {
        let mut queries: Vec<PersistedQuery> = self
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                Some(PersistedQuery {
                    key: key.clone(),
                    data: entry.data.clone()?,
                    data_updated_at: entry.data_updated_at?,
                })
            })
            .collect();
        queries.sort_by(|a, b| a.key.cmp(&b.key));
        PersistedCache {
            buster: buster.to_string(),
            timestamp: now,
            queries,
        }
    }

    /// Write the current data to `store` under the configured key.
    pub fn persist(
        &self,
        store: &dyn CacheStore,
        config: &ClientConfig,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let json = self.snapshot(&config.persistence_buster, now).to_json()?;
        store.set_item(&config.persistence_key, &json)
    }

    /// Rebuild a cache from `store`.
    ///
    /// Unreadable, outdated or expired snapshots are removed and an empty
    /// cache is returned; this never fails.
    pub fn restore(config: &ClientConfig, store: &dyn CacheStore, now: DateTime<Utc>) -> Self {
        let mut cache = Self::new(config);
        let max_age = to_chrono(config.cache_max_age);

        let raw = match store.get_item(&config.persistence_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return cache,
            Err(e) => {
                warn!("Could not read persisted cache: {e}");
                return cache;
            }
        };

        let mut snapshot = match PersistedCache::from_json(&raw) {
            Ok(snapshot) if snapshot.is_usable(&config.persistence_buster, now, max_age) => snapshot,
            Ok(_) => {
                info!("Discarding outdated persisted cache");
                discard(store, &config.persistence_key);
                return cache;
            }
            Err(e) => {
                warn!("Discarding unreadable persisted cache: {e}");
                discard(store, &config.persistence_key);
                return cache;
            }
        };

        let pruned = snapshot.prune(now, max_age);
        info!(
            "Restored {} cached queries ({pruned} expired)",
            snapshot.queries.len()
        );
        for query in snapshot.queries {
            cache.entries.insert(
                query.key,
                QueryState {
                    data: Some(query.data),
                    data_updated_at: Some(query.data_updated_at),
                    ..QueryState::default()
                },
            );
        }
        cache
    }

    fn emit(&self, key: QueryKey, kind: CacheEventKind) {
        // No receivers is fine.
        let _ = self.events.send(CacheEvent { key, kind });
    }
}

fn discard(store: &dyn CacheStore, key: &str) {
    if let Err(e) = store.remove_item(key) {
        warn!("Could not remove persisted cache: {e}");
    }
}

pub(crate) fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365_000))
}
