//! Query coordinator for the incident list.
//!
//! Owns the current filter, cursor and cursor history of one list view,
//! derives the cache key from them, issues LIST requests when the key changes
//! (or on refresh) and publishes a read model derived from the current key's
//! cache entry only.

use super::cache::{CacheStore, FetchStatus, QueryData};
use super::cursor::CursorHistory;
use super::filter::{CacheKey, FilterCodec, FilterState, ListLocation};
use crate::api::IncidentApi;
use crate::error::AppError;
use crate::models::{Cursor, Incident};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// What the list screen should render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Nothing requested yet
    Idle,
    /// First load for this key, nothing to show yet
    Loading,
    /// Failed with no prior success for this key
    Error,
    /// Loaded successfully, zero matches
    NoMatches,
    /// Items to show (possibly stale, possibly alongside an error)
    Ready,
}

/// Read-only projection of the current key's cache entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListView {
    pub filter: FilterState,
    pub cursor: Option<Cursor>,
    pub status: FetchStatus,
    pub items: Vec<Incident>,
    pub loading: bool,
    pub error: Option<String>,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
    /// Items belong to another page of the same filter, shown while loading
    pub is_placeholder: bool,
    pub can_go_back: bool,
}

impl ListView {
    pub fn state(&self) -> ViewState {
        if !self.items.is_empty() {
            return ViewState::Ready;
        }
        match self.status {
            FetchStatus::Idle => ViewState::Idle,
            FetchStatus::Loading => ViewState::Loading,
            FetchStatus::Error => ViewState::Error,
            FetchStatus::Success => ViewState::NoMatches,
        }
    }

    pub fn can_go_next(&self) -> bool {
        self.has_more && self.next_cursor.is_some() && !self.loading
    }

    pub fn can_go_previous(&self) -> bool {
        self.can_go_back && !self.loading
    }

    pub fn location(&self) -> ListLocation {
        ListLocation::new(self.filter.clone(), self.cursor.clone())
    }
}

#[derive(Debug)]
struct ListState {
    filter: FilterState,
    cursor: Option<Cursor>,
    history: CursorHistory,
    disposed: bool,
}

impl ListState {
    fn key(&self) -> CacheKey {
        CacheKey::list(self.filter.clone(), self.cursor.clone())
    }
}

/// Coordinates fetching, caching and pagination for one list view
pub struct ListQuery {
    api: Arc<dyn IncidentApi>,
    cache: CacheStore,
    codec: FilterCodec,
    stale_after: Duration,
    state: Mutex<ListState>,
    view_tx: watch::Sender<ListView>,
}

impl ListQuery {
    /// Create a coordinator positioned at `location`; nothing is fetched until
    /// the first [`ListQuery::read`].
    pub fn new(api: Arc<dyn IncidentApi>, cache: CacheStore, location: ListLocation) -> Self {
        let codec = FilterCodec::default();
        let state = ListState {
            filter: codec.normalize(location.filter),
            cursor: location.cursor,
            history: CursorHistory::new(),
            disposed: false,
        };
        let (view_tx, _) = watch::channel(ListView::default());
        let query = Self {
            api,
            cache,
            codec,
            stale_after: Duration::ZERO,
            state: Mutex::new(state),
            view_tx,
        };
        query.publish();
        query
    }

    /// Page-size policy applied to every incoming filter
    pub fn with_codec(mut self, codec: FilterCodec) -> Self {
        self.codec = codec;
        let state = self.state.get_mut();
        state.filter = codec.normalize(state.filter.clone());
        self.publish();
        self
    }

    pub fn codec(&self) -> FilterCodec {
        self.codec
    }

    /// Serve successful entries younger than `stale_after` without refetching
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn key(&self) -> CacheKey {
        self.state.lock().key()
    }

    /// The shareable part of the current state
    pub fn location(&self) -> ListLocation {
        let state = self.state.lock();
        ListLocation::new(state.filter.clone(), state.cursor.clone())
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Current read model
    pub fn view(&self) -> ListView {
        let state = self.state.lock();
        self.compute_view(&state)
    }

    /// Change notification; receivers re-read on every change
    pub fn subscribe(&self) -> watch::Receiver<ListView> {
        self.view_tx.subscribe()
    }

    /// Fetch the current key if it was never loaded or has been invalidated,
    /// then return the view.
    pub async fn read(&self) -> ListView {
        let needs_fetch = {
            let state = self.state.lock();
            if state.disposed {
                return self.compute_view(&state);
            }
            match self.cache.get(&state.key()) {
                None => true,
                Some(entry) => {
                    entry.status == FetchStatus::Idle
                        || (entry.invalidated && entry.status != FetchStatus::Loading)
                }
            }
        };
        if needs_fetch {
            self.fetch_current().await;
        }
        self.view()
    }

    /// Refetch the current key even if it holds a success; history is kept
    pub async fn refresh(&self) -> ListView {
        if self.is_disposed() {
            return self.view();
        }
        self.fetch_current().await;
        self.view()
    }

    /// Apply a new filter; any change returns to the first page
    pub async fn set_filter(&self, filter: FilterState) -> ListView {
        let filter = self.codec.normalize(filter);
        {
            let mut state = self.state.lock();
            if state.disposed || state.filter == filter {
                return self.compute_view(&state);
            }
            debug!(filter = ?filter, "Filter changed");
            state.filter = filter;
            state.cursor = None;
            state.history.reset();
        }
        self.on_key_change().await
    }

    /// Jump to a location restored from a shareable link; history starts empty
    pub async fn set_location(&self, location: ListLocation) -> ListView {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return self.compute_view(&state);
            }
            state.filter = self.codec.normalize(location.filter);
            state.cursor = location.cursor;
            state.history.reset();
        }
        self.on_key_change().await
    }

    /// Follow the current page's `next_cursor`
    pub async fn next_page(&self) -> ListView {
        {
            let mut state = self.state.lock();
            let view = self.compute_view(&state);
            if state.disposed || !view.can_go_next() {
                return view;
            }
            let Some(next) = view.next_cursor.clone() else {
                return view;
            };
            let current = state.cursor.take();
            state.cursor = Some(state.history.advance(current, next));
        }
        self.on_key_change().await
    }

    /// Return to the cursor active before the last `next_page`
    pub async fn previous_page(&self) -> ListView {
        {
            let mut state = self.state.lock();
            let view = self.compute_view(&state);
            if state.disposed || view.loading {
                return view;
            }
            match state.history.retreat() {
                Ok(previous) => state.cursor = previous,
                Err(AppError::NoHistory) => {
                    debug!("Previous page requested with empty history");
                    return view;
                }
                Err(err) => {
                    warn!(error = %err, "Unexpected cursor history failure");
                    return view;
                }
            }
        }
        self.on_key_change().await
    }

    /// Drop the cursor and history, back to the first page of the same filter
    pub async fn clear_cursor(&self) -> ListView {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return self.compute_view(&state);
            }
            state.cursor = None;
            state.history.reset();
        }
        self.on_key_change().await
    }

    /// Stop publishing; in-flight responses are ignored when they land
    pub fn dispose(&self) {
        self.state.lock().disposed = true;
        debug!("List query disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    async fn on_key_change(&self) -> ListView {
        let key = self.key();
        let fresh = self
            .cache
            .get(&key)
            .map_or(false, |entry| entry.is_fresh(self.cache.now(), self.stale_after));

        if fresh {
            debug!(key = ?key, "Serving fresh cache entry");
            self.publish();
        } else {
            self.fetch_current().await;
        }
        self.view()
    }

    async fn fetch_current(&self) {
        let (filter, cursor) = {
            let state = self.state.lock();
            (state.filter.clone(), state.cursor.clone())
        };
        let key = CacheKey::list(filter.clone(), cursor.clone());

        let request_seq = self.cache.begin_fetch(&key);
        self.publish();

        let result = self.api.list(&filter, cursor.as_ref()).await;
        if let Err(err) = &result {
            warn!(
                key = ?key,
                request_seq,
                error_code = err.error_code(),
                error = %err,
                "Incident list fetch failed"
            );
        }

        // The shared cache still takes the result; only this view goes quiet
        match self
            .cache
            .complete_fetch(&key, request_seq, result.map(QueryData::Page))
        {
            Ok(()) | Err(AppError::Stale) => {}
            Err(err) => warn!(error = %err, "Failed to record fetch result"),
        }
        if self.is_disposed() {
            debug!(key = ?key, request_seq, "Response landed after dispose");
            return;
        }
        self.publish();
    }

    fn compute_view(&self, state: &ListState) -> ListView {
        let mut view = ListView {
            filter: state.filter.clone(),
            cursor: state.cursor.clone(),
            can_go_back: state.history.can_go_back(),
            ..Default::default()
        };

        let Some(entry) = self.cache.get(&state.key()) else {
            return view;
        };

        view.status = entry.status;
        view.loading = entry.status == FetchStatus::Loading;
        view.error = entry.error;
        view.is_placeholder = entry.placeholder;

        if let Some(QueryData::Page(page)) = entry.data {
            if !entry.placeholder && page.has_more {
                view.has_more = true;
                view.next_cursor = page.next_cursor;
            }
            view.items = page.items;
        }
        view
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current != view {
                *current = view;
                true
            } else {
                false
            }
        });
    }
}
