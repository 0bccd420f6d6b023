//! Query for a single incident, keyed by id.

use super::cache::{CacheStore, FetchStatus, QueryData};
use super::filter::CacheKey;
use crate::api::IncidentApi;
use crate::error::AppError;
use crate::models::{Incident, IncidentId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Read model of the detail screen
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailView {
    pub incident: Option<Incident>,
    pub status: FetchStatus,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct DetailQuery {
    api: Arc<dyn IncidentApi>,
    cache: CacheStore,
    id: IncidentId,
    disposed: AtomicBool,
    view_tx: watch::Sender<DetailView>,
}

impl DetailQuery {
    pub fn new(api: Arc<dyn IncidentApi>, cache: CacheStore, id: IncidentId) -> Self {
        let (view_tx, _) = watch::channel(DetailView::default());
        let query = Self {
            api,
            cache,
            id,
            disposed: AtomicBool::new(false),
            view_tx,
        };
        query.publish();
        query
    }

    pub fn id(&self) -> IncidentId {
        self.id
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::detail(self.id)
    }

    /// Current read model; reflects writes made by mutations immediately
    pub fn view(&self) -> DetailView {
        let Some(entry) = self.cache.get(&self.key()) else {
            return DetailView::default();
        };
        DetailView {
            incident: entry.data.as_ref().and_then(QueryData::as_incident).cloned(),
            status: entry.status,
            loading: entry.status == FetchStatus::Loading,
            error: entry.error,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailView> {
        self.view_tx.subscribe()
    }

    /// Fetch if never loaded or invalidated, then return the view
    pub async fn read(&self) -> DetailView {
        let needs_fetch = match self.cache.get(&self.key()) {
            None => true,
            Some(entry) => {
                entry.status == FetchStatus::Idle
                    || (entry.invalidated && entry.status != FetchStatus::Loading)
            }
        };
        if needs_fetch && !self.is_disposed() {
            self.fetch().await;
        }
        self.view()
    }

    pub async fn refresh(&self) -> DetailView {
        if !self.is_disposed() {
            self.fetch().await;
        }
        self.view()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn fetch(&self) {
        let key = self.key();
        let request_seq = self.cache.begin_fetch(&key);
        self.publish();

        let result = self.api.get(self.id).await;
        if let Err(err) = &result {
            warn!(incident_id = self.id, error = %err, "Incident fetch failed");
        }
        match self
            .cache
            .complete_fetch(&key, request_seq, result.map(QueryData::Incident))
        {
            Ok(()) | Err(AppError::Stale) => {}
            Err(err) => warn!(error = %err, "Failed to record fetch result"),
        }
        if self.is_disposed() {
            debug!(incident_id = self.id, request_seq, "Response landed after dispose");
            return;
        }
        self.publish();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryIncidentApi;
    use crate::models::NewIncident;

    #[tokio::test]
    async fn test_read_loads_once() {
        let backend = InMemoryIncidentApi::new();
        let incident = backend.insert(NewIncident::new("Cache miss storm", "cdn").into_payload());
        let query = DetailQuery::new(Arc::new(backend), CacheStore::new(), incident.id);

        let view = query.read().await;
        assert_eq!(view.incident, Some(incident));
        assert_eq!(view.status, FetchStatus::Success);
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_unknown_id_reports_not_found() {
        let query = DetailQuery::new(Arc::new(InMemoryIncidentApi::new()), CacheStore::new(), 42);

        let view = query.read().await;
        assert_eq!(view.incident, None);
        assert_eq!(view.status, FetchStatus::Error);
        assert_eq!(view.error.as_deref(), Some("Incident not found"));
    }

    #[tokio::test]
    async fn test_cache_writes_are_visible_without_fetch() {
        let backend = InMemoryIncidentApi::new();
        let incident = backend.insert(NewIncident::new("Queue stuck", "jobs").into_payload());
        let cache = CacheStore::new();
        let query = DetailQuery::new(Arc::new(backend), cache.clone(), incident.id);

        cache.put(&query.key(), QueryData::Incident(incident.clone()));
        assert_eq!(query.view().incident, Some(incident));
    }
}
