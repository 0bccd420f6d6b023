use super::IncidentApi;
use crate::error::{AppError, Result};
use crate::models::{
    CreateIncidentPayload, Cursor, Incident, IncidentId, Page, UpdateIncidentPayload,
};
use crate::query::clock::{Clock, SystemClock};
use crate::query::filter::{FilterState, DEFAULT_LIMIT, MAX_LIMIT};
use async_trait::async_trait;
use base64ct::{Base64Url, Encoding};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use validator::Validate;

/// Position after the last item of a page: newest-first by (created_at, id)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorPosition {
    created_at: DateTime<Utc>,
    id: IncidentId,
}

impl CursorPosition {
    fn encode(&self) -> Result<Cursor> {
        let raw = serde_json::to_vec(self)?;
        Ok(Cursor::new(Base64Url::encode_string(&raw)))
    }

    fn decode(cursor: &Cursor) -> Result<Self> {
        let raw = Base64Url::decode_vec(cursor.as_str())
            .map_err(|_| AppError::server(400, Some("Invalid cursor".to_string())))?;
        serde_json::from_slice(&raw)
            .map_err(|_| AppError::server(400, Some("Invalid cursor".to_string())))
    }

    /// Strictly after this position in newest-first order
    fn precedes(&self, incident: &Incident) -> bool {
        incident.created_at < self.created_at
            || (incident.created_at == self.created_at && incident.id < self.id)
    }
}

/// In-memory incidents backend (for offline use and testing)
#[derive(Debug, Clone)]
pub struct InMemoryIncidentApi {
    incidents: Arc<DashMap<IncidentId, Incident>>,
    next_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

impl InMemoryIncidentApi {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            incidents: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
            clock,
        }
    }

    /// Insert directly, bypassing validation
    pub fn insert(&self, payload: CreateIncidentPayload) -> Incident {
        let now = self.clock.now();
        let incident = Incident {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            title: payload.title,
            service: payload.service,
            severity: payload.severity,
            status: payload.status.unwrap_or_default(),
            owner: payload.owner,
            summary: payload.summary,
            created_at: now,
            updated_at: now,
        };
        self.incidents.insert(incident.id, incident.clone());
        tracing::debug!(incident_id = incident.id, "Incident saved");
        incident
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    fn matches(filter: &FilterState, incident: &Incident) -> bool {
        let severity_match = filter.severity.map_or(true, |s| incident.severity == s);
        let status_match = filter.status.map_or(true, |s| incident.status == s);
        let service_match = filter.service.is_empty() || incident.service == filter.service;
        let search_match = filter.search.is_empty() || {
            let needle = filter.search.to_lowercase();
            incident.title.to_lowercase().contains(&needle)
                || incident.service.to_lowercase().contains(&needle)
                || incident
                    .summary
                    .as_deref()
                    .map_or(false, |s| s.to_lowercase().contains(&needle))
        };

        severity_match && status_match && service_match && search_match
    }
}

impl Default for InMemoryIncidentApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentApi for InMemoryIncidentApi {
    async fn list(&self, filter: &FilterState, cursor: Option<&Cursor>) -> Result<Page> {
        let limit = match filter.limit {
            0 => DEFAULT_LIMIT,
            limit => limit.min(MAX_LIMIT),
        };
        let limit = limit as usize;
        let after = cursor.map(CursorPosition::decode).transpose()?;

        let mut incidents: Vec<Incident> = self
            .incidents
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|incident| Self::matches(filter, incident))
            .filter(|incident| after.as_ref().map_or(true, |pos| pos.precedes(incident)))
            .collect();

        // Sort by creation time (newest first), id breaks ties
        incidents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        // One extra row tells whether another page exists
        incidents.truncate(limit + 1);
        if incidents.len() > limit {
            incidents.truncate(limit);
            let next_cursor = incidents
                .last()
                .map(|last| {
                    CursorPosition {
                        created_at: last.created_at,
                        id: last.id,
                    }
                    .encode()
                })
                .transpose()?;
            Ok(Page::new(incidents, next_cursor))
        } else {
            Ok(Page::new(incidents, None))
        }
    }

    async fn get(&self, id: IncidentId) -> Result<Incident> {
        self.incidents
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound("Incident not found".to_string()))
    }

    async fn create(&self, payload: &CreateIncidentPayload) -> Result<Incident> {
        payload.validate()?;
        Ok(self.insert(payload.clone()))
    }

    async fn update(&self, id: IncidentId, payload: &UpdateIncidentPayload) -> Result<Incident> {
        payload.validate()?;
        let mut entry = self
            .incidents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Incident not found".to_string()))?;

        let incident = entry.value_mut();
        if let Some(title) = &payload.title {
            incident.title = title.clone();
        }
        if let Some(service) = &payload.service {
            incident.service = service.clone();
        }
        if let Some(severity) = payload.severity {
            incident.severity = severity;
        }
        if let Some(status) = payload.status {
            incident.status = status;
        }
        if let Some(owner) = &payload.owner {
            incident.owner = owner.clone();
        }
        if let Some(summary) = &payload.summary {
            incident.summary = summary.clone();
        }
        incident.updated_at = self.clock.now();

        tracing::debug!(incident_id = id, "Incident updated");
        Ok(incident.clone())
    }
}
