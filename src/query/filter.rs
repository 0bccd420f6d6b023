//! FilterState codec.
//!
//! Converts the flat list-query parameters to and from their canonical
//! query-string form, and derives the cache identity of a list request.

use crate::config::PaginationConfig;
use crate::models::{Cursor, IncidentId, Severity, Status};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::form_urlencoded;

/// Page size used when none is requested
pub const DEFAULT_LIMIT: u32 = 20;
/// Upper bound for any requested page size
pub const MAX_LIMIT: u32 = 100;

/// The full set of list-query constraints chosen by the user.
///
/// Empty strings and `None` mean "no constraint".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    pub search: String,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub service: String,
    pub limit: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            severity: None,
            status: None,
            service: String::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl FilterState {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_status(mut self, status: Option<Status>) -> Self {
        self.status = status;
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Query parameters for the LIST endpoint; unconstrained fields are omitted
    pub fn to_request_params(&self, cursor: Option<&Cursor>) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        params.extend(self.constraint_params());
        params
    }

    fn constraint_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.search.is_empty() {
            params.push(("search", self.search.clone()));
        }
        if let Some(severity) = self.severity {
            params.push(("severity", severity.to_string()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.to_string()));
        }
        if !self.service.is_empty() {
            params.push(("service", self.service.clone()));
        }
        params
    }
}

/// Identity of a cached read.
///
/// Equality and hashing are field-wise, so two keys built from the same
/// filter values compare equal no matter how the values were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    List {
        filter: FilterState,
        cursor: Option<Cursor>,
    },
    Detail(IncidentId),
}

impl CacheKey {
    pub fn list(filter: FilterState, cursor: Option<Cursor>) -> Self {
        CacheKey::List { filter, cursor }
    }

    pub fn detail(id: IncidentId) -> Self {
        CacheKey::Detail(id)
    }

    /// Whether this key caches list contents
    pub fn is_list(&self) -> bool {
        matches!(self, CacheKey::List { .. })
    }

    pub fn filter(&self) -> Option<&FilterState> {
        match self {
            CacheKey::List { filter, .. } => Some(filter),
            CacheKey::Detail(_) => None,
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            CacheKey::List { cursor, .. } => cursor.as_ref(),
            CacheKey::Detail(_) => None,
        }
    }

    /// Two list keys over the same filter, possibly at different cursors
    pub fn shares_filter_with(&self, other: &CacheKey) -> bool {
        match (self.filter(), other.filter()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Limit policy plus the canonical query-string encoding of list locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCodec {
    default_limit: u32,
    max_limit: u32,
}

impl Default for FilterCodec {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl From<&PaginationConfig> for FilterCodec {
    fn from(config: &PaginationConfig) -> Self {
        Self::new(config.default_limit, config.max_limit)
    }
}

impl FilterCodec {
    pub fn new(default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// A fresh, unconstrained filter at the default page size
    pub fn initial(&self) -> FilterState {
        FilterState::default().with_limit(self.default_limit)
    }

    /// Clamp a page size the way a decoded location would
    pub fn clamp_limit(&self, limit: u32) -> u32 {
        match limit {
            0 => self.default_limit,
            limit => limit.min(self.max_limit),
        }
    }

    /// The filter a round trip through the query string would produce
    pub fn normalize(&self, filter: FilterState) -> FilterState {
        let limit = self.clamp_limit(filter.limit);
        filter.with_limit(limit)
    }

    /// Parse a raw page size; missing, zero or garbage falls back to the default
    pub fn normalize_limit(&self, raw: Option<&str>) -> u32 {
        raw.and_then(|v| v.trim().parse::<u32>().ok())
            .map_or(self.default_limit, |limit| self.clamp_limit(limit))
    }

    /// Canonical pairs: fixed key order, default limit and empty fields omitted
    pub fn encode(&self, filter: &FilterState, cursor: Option<&Cursor>) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = filter
            .constraint_params()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        if filter.limit != self.default_limit {
            pairs.push(("limit".to_string(), filter.limit.to_string()));
        }
        if let Some(cursor) = cursor {
            pairs.push(("cursor".to_string(), cursor.to_string()));
        }
        pairs
    }

    /// Rebuild a filter and cursor from query pairs.
    ///
    /// The first occurrence of a key wins, unknown keys are ignored and
    /// unrecognized enum values mean "no constraint".
    pub fn decode<I, K, V>(&self, pairs: I) -> (FilterState, Option<Cursor>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut search = None;
        let mut severity = None;
        let mut status = None;
        let mut service = None;
        let mut limit = None;
        let mut cursor = None;

        for (key, value) in pairs {
            let value = value.as_ref();
            let slot = match key.as_ref() {
                "search" => &mut search,
                "severity" => &mut severity,
                "status" => &mut status,
                "service" => &mut service,
                "limit" => &mut limit,
                "cursor" => &mut cursor,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }

        let filter = FilterState {
            search: search.unwrap_or_default(),
            severity: severity.and_then(|v| Severity::from_str(&v).ok()),
            status: status.and_then(|v| Status::from_str(&v).ok()),
            service: service.unwrap_or_default(),
            limit: self.normalize_limit(limit.as_deref()),
        };
        (filter, cursor.as_deref().and_then(Cursor::parse))
    }
}

/// The shareable, reloadable part of a list view: filter plus cursor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListLocation {
    pub filter: FilterState,
    pub cursor: Option<Cursor>,
}

impl ListLocation {
    pub fn new(filter: FilterState, cursor: Option<Cursor>) -> Self {
        Self { filter, cursor }
    }

    /// Render as a URL query string (without the leading `?`)
    pub fn to_query_string(&self, codec: &FilterCodec) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(codec.encode(&self.filter, self.cursor.as_ref()))
            .finish()
    }

    /// Parse a URL query string, with or without the leading `?`
    pub fn parse(query: &str, codec: &FilterCodec) -> Self {
        let query = query.trim().trim_start_matches('?');
        let (filter, cursor) = codec.decode(form_urlencoded::parse(query.as_bytes()));
        Self { filter, cursor }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::list(self.filter.clone(), self.cursor.clone())
    }
}
