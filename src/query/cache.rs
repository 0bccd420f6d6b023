//! Keyed store of fetch results.
//!
//! Every entry carries a per-key request sequence number. A completion is
//! applied only when it carries the latest sequence issued for its key, so
//! responses that arrive out of order can never overwrite a newer result.

use super::clock::{Clock, SystemClock};
use super::filter::CacheKey;
use crate::error::{AppError, Result};
use crate::models::{Incident, Page};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lifecycle of a cached read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "idle"),
            FetchStatus::Loading => write!(f, "loading"),
            FetchStatus::Success => write!(f, "success"),
            FetchStatus::Error => write!(f, "error"),
        }
    }
}

/// Payload of a successful read
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Page(Page),
    Incident(Incident),
}

impl QueryData {
    pub fn as_page(&self) -> Option<&Page> {
        match self {
            QueryData::Page(page) => Some(page),
            QueryData::Incident(_) => None,
        }
    }

    pub fn as_incident(&self) -> Option<&Incident> {
        match self {
            QueryData::Incident(incident) => Some(incident),
            QueryData::Page(_) => None,
        }
    }
}

impl From<Page> for QueryData {
    fn from(page: Page) -> Self {
        QueryData::Page(page)
    }
}

impl From<Incident> for QueryData {
    fn from(incident: Incident) -> Self {
        QueryData::Incident(incident)
    }
}

/// A single cached read
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: FetchStatus,
    pub data: Option<QueryData>,
    pub error: Option<String>,
    pub request_seq: u64,
    pub last_updated: Option<DateTime<Utc>>,
    /// `data` was carried over from another cursor of the same filter and is
    /// not this key's confirmed result
    pub placeholder: bool,
    /// Marked by a mutation; the next read must refetch
    pub invalidated: bool,
    settled_order: u64,
    /// Bumped by every `invalidate` that matches this entry
    invalidation_epoch: u64,
    /// `invalidation_epoch` when the latest fetch began
    fetch_epoch: u64,
}

impl CacheEntry {
    fn new(key: CacheKey) -> Self {
        Self {
            key,
            status: FetchStatus::Idle,
            data: None,
            error: None,
            request_seq: 0,
            last_updated: None,
            placeholder: false,
            invalidated: false,
            settled_order: 0,
            invalidation_epoch: 0,
            fetch_epoch: 0,
        }
    }

    /// Data confirmed for this key (not a carried-over placeholder)
    pub fn confirmed_data(&self) -> Option<&QueryData> {
        if self.placeholder {
            None
        } else {
            self.data.as_ref()
        }
    }

    /// A success that is neither invalidated nor older than `stale_after`
    pub fn is_fresh(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if self.status != FetchStatus::Success || self.invalidated {
            return false;
        }
        match (self.last_updated, chrono::Duration::from_std(stale_after)) {
            (Some(updated), Ok(window)) => now - updated < window,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<CacheKey, CacheEntry>,
    settle_counter: u64,
}

/// Shared cache of list pages and incident details.
///
/// Cloning is cheap and yields a handle to the same entries.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<RwLock<StoreInner>>,
    clock: Arc<dyn Clock>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.read().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fetch for `key` and return its request sequence number.
    ///
    /// The entry keeps its own previous data while loading. A list entry with
    /// no data of its own borrows the most recently settled page of the same
    /// filter as a placeholder.
    pub fn begin_fetch(&self, key: &CacheKey) -> u64 {
        let mut inner = self.inner.write();

        let needs_placeholder = key.is_list()
            && inner
                .entries
                .get(key)
                .map_or(true, |entry| entry.data.is_none());
        let placeholder = if needs_placeholder {
            inner
                .entries
                .values()
                .filter(|entry| {
                    entry.key != *key
                        && entry.status == FetchStatus::Success
                        && entry.key.shares_filter_with(key)
                })
                .max_by_key(|entry| entry.settled_order)
                .and_then(|entry| entry.confirmed_data().cloned())
        } else {
            None
        };

        let entry = inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone()));
        entry.request_seq += 1;
        entry.fetch_epoch = entry.invalidation_epoch;
        entry.status = FetchStatus::Loading;
        entry.error = None;
        if let Some(data) = placeholder {
            entry.data = Some(data);
            entry.placeholder = true;
        }

        debug!(
            key = ?key,
            request_seq = entry.request_seq,
            placeholder = entry.placeholder,
            "Fetch begun"
        );
        entry.request_seq
    }

    /// Apply the outcome of the fetch identified by `request_seq`.
    ///
    /// Returns `AppError::Stale` without touching the entry when a later
    /// fetch for the same key has been started since.
    pub fn complete_fetch(
        &self,
        key: &CacheKey,
        request_seq: u64,
        result: Result<QueryData>,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        inner.settle_counter += 1;
        let settled_order = inner.settle_counter;

        let entry = match inner.entries.get_mut(key) {
            Some(entry) if entry.request_seq == request_seq => entry,
            Some(entry) => {
                debug!(
                    key = ?key,
                    request_seq,
                    current_seq = entry.request_seq,
                    "Discarding stale response"
                );
                return Err(AppError::Stale);
            }
            None => return Err(AppError::Stale),
        };

        match result {
            Ok(data) => {
                entry.status = FetchStatus::Success;
                entry.data = Some(data);
                entry.error = None;
                entry.placeholder = false;
                // A response requested before the latest invalidation stays invalid
                entry.invalidated = entry.fetch_epoch != entry.invalidation_epoch;
                entry.last_updated = Some(now);
                entry.settled_order = settled_order;
            }
            Err(err) => {
                entry.status = FetchStatus::Error;
                entry.error = Some(err.user_message());
                // Borrowed data must not masquerade as this key's result
                if entry.placeholder {
                    entry.data = None;
                    entry.placeholder = false;
                }
            }
        }
        Ok(())
    }

    /// Write a confirmed value, superseding any fetch in flight for `key`
    pub fn put(&self, key: &CacheKey, data: QueryData) {
        let request_seq = self.begin_fetch(key);
        let recorded = self.complete_fetch(key, request_seq, Ok(data));
        debug_assert!(recorded.is_ok(), "sequence issued by this call went stale");
    }

    /// Mark every entry whose key matches `predicate` for refetch on next read
    pub fn invalidate<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let mut inner = self.inner.write();
        let mut count = 0;
        for entry in inner.entries.values_mut() {
            if predicate(&entry.key) {
                entry.invalidated = true;
                entry.invalidation_epoch += 1;
                count += 1;
            }
        }
        debug!(invalidated = count, "Cache entries invalidated");
        count
    }
}
