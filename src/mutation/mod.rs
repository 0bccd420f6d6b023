//! Mutation coordinator: create and update incidents, then reconcile the cache.
//!
//! Both operations invalidate every list entry on success (membership and
//! ordering of any filtered list may have changed) and write the server's
//! canonical record into the incident's detail entry. Concurrent edits are
//! last-write-wins.

mod diff;

pub use diff::{minimal_update, IncidentEdit};

use crate::api::IncidentApi;
use crate::error::{AppError, Result};
use crate::models::{
    CreateIncidentPayload, Incident, IncidentId, NewIncident, UpdateIncidentPayload, MAX_OWNER_LEN,
};
use crate::query::{CacheKey, CacheStore, QueryData};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

pub struct MutationCoordinator {
    api: Arc<dyn IncidentApi>,
    cache: CacheStore,
}

impl MutationCoordinator {
    pub fn new(api: Arc<dyn IncidentApi>, cache: CacheStore) -> Self {
        Self { api, cache }
    }

    /// Normalize and validate a create form without touching the network
    pub fn prepare_create(draft: NewIncident) -> Result<CreateIncidentPayload> {
        let payload = draft.into_payload();
        if payload.title.is_empty() || payload.service.is_empty() {
            return Err(AppError::Validation(
                "Title and service are required.".to_string(),
            ));
        }
        payload.validate()?;
        Ok(payload)
    }

    /// Diff `edit` against the displayed record and validate the result.
    ///
    /// `Ok(None)` means nothing changed.
    pub fn prepare_update(
        &self,
        id: IncidentId,
        edit: &IncidentEdit,
    ) -> Result<Option<UpdateIncidentPayload>> {
        let current = self
            .cache
            .get(&CacheKey::detail(id))
            .and_then(|entry| entry.confirmed_data().and_then(QueryData::as_incident).cloned());

        let payload = minimal_update(current.as_ref(), edit);
        if payload.is_empty() {
            return Ok(None);
        }

        payload.validate()?;
        if let Some(Some(owner)) = &payload.owner {
            if owner.chars().count() > MAX_OWNER_LEN {
                return Err(AppError::Validation(format!(
                    "owner: must be at most {} characters",
                    MAX_OWNER_LEN
                )));
            }
        }
        Ok(Some(payload))
    }

    /// Create an incident and return the server's record
    pub async fn create(&self, draft: NewIncident) -> Result<Incident> {
        let payload = Self::prepare_create(draft)?;

        let incident = self.api.create(&payload).await.map_err(|e| {
            warn!(error = %e, "Incident creation failed");
            e
        })?;

        let invalidated = self.cache.invalidate(CacheKey::is_list);
        self.cache
            .put(&CacheKey::detail(incident.id), QueryData::Incident(incident.clone()));

        info!(
            incident_id = incident.id,
            invalidated_lists = invalidated,
            "Incident created"
        );
        Ok(incident)
    }

    /// Send the fields of `edit` that differ from the displayed record.
    ///
    /// Returns `Ok(None)` without a request when nothing changed.
    pub async fn update(&self, id: IncidentId, edit: &IncidentEdit) -> Result<Option<Incident>> {
        let Some(payload) = self.prepare_update(id, edit)? else {
            debug!(incident_id = id, "No changed fields, skipping update");
            return Ok(None);
        };

        let updated = self.api.update(id, &payload).await.map_err(|e| {
            warn!(incident_id = id, error = %e, "Incident update failed");
            e
        })?;

        self.cache
            .put(&CacheKey::detail(id), QueryData::Incident(updated.clone()));
        let invalidated = self.cache.invalidate(CacheKey::is_list);

        info!(
            incident_id = id,
            fields = ?payload.changed_fields(),
            invalidated_lists = invalidated,
            "Incident updated"
        );
        Ok(Some(updated))
    }
}
