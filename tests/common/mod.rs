//! Shared fixtures for integration tests.
//!
//! [`RecordingApi`] wraps the in-memory backend, records every call in
//! order, and can hold LIST responses behind gates so tests decide the order
//! in which responses land.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use incident_console::api::{InMemoryIncidentApi, IncidentApi};
use incident_console::error::{AppError, Result};
use incident_console::models::{
    CreateIncidentPayload, Cursor, Incident, IncidentId, NewIncident, Page, Severity, Status,
    UpdateIncidentPayload,
};
use incident_console::query::{FilterState, ManualClock};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List {
        filter: FilterState,
        cursor: Option<Cursor>,
    },
    Get(IncidentId),
    Create(CreateIncidentPayload),
    Update(IncidentId, UpdateIncidentPayload),
}

pub struct RecordingApi {
    backend: InMemoryIncidentApi,
    calls: Mutex<Vec<Call>>,
    list_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    list_failures: Mutex<VecDeque<AppError>>,
}

impl RecordingApi {
    pub fn new(backend: InMemoryIncidentApi) -> Arc<Self> {
        Arc::new(Self {
            backend,
            calls: Mutex::new(Vec::new()),
            list_gates: Mutex::new(VecDeque::new()),
            list_failures: Mutex::new(VecDeque::new()),
        })
    }

    pub fn backend(&self) -> &InMemoryIncidentApi {
        &self.backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn list_calls(&self) -> Vec<(FilterState, Option<Cursor>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::List { filter, cursor } => Some((filter.clone(), cursor.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn list_count(&self) -> usize {
        self.list_calls().len()
    }

    pub fn network_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// The next LIST call waits until the returned sender fires (or is dropped)
    pub fn gate_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().push_back(rx);
        tx
    }

    /// The next LIST call fails with `error`
    pub fn fail_next_list(&self, error: AppError) {
        self.list_failures.lock().push_back(error);
    }
}

#[async_trait]
impl IncidentApi for RecordingApi {
    async fn list(&self, filter: &FilterState, cursor: Option<&Cursor>) -> Result<Page> {
        self.calls.lock().push(Call::List {
            filter: filter.clone(),
            cursor: cursor.cloned(),
        });
        let gate = self.list_gates.lock().pop_front();
        let failure = self.list_failures.lock().pop_front();

        // The response is produced at request time and delivered once the gate opens
        let response = match failure {
            Some(error) => Err(error),
            None => self.backend.list(filter, cursor).await,
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        response
    }

    async fn get(&self, id: IncidentId) -> Result<Incident> {
        self.calls.lock().push(Call::Get(id));
        self.backend.get(id).await
    }

    async fn create(&self, payload: &CreateIncidentPayload) -> Result<Incident> {
        self.calls.lock().push(Call::Create(payload.clone()));
        self.backend.create(payload).await
    }

    async fn update(&self, id: IncidentId, payload: &UpdateIncidentPayload) -> Result<Incident> {
        self.calls.lock().push(Call::Update(id, payload.clone()));
        self.backend.update(id, payload).await
    }
}

/// Backend holding `count` incidents created one minute apart.
///
/// Incident `n` is titled "Incident n"; odd ids are OPEN SEV2 on "api",
/// even ids are RESOLVED SEV3 on "db".
pub fn seeded_backend(count: usize) -> InMemoryIncidentApi {
    let clock = Arc::new(ManualClock::new(
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
    ));
    let backend = InMemoryIncidentApi::with_clock(clock.clone());
    for n in 1..=count {
        let draft = if n % 2 == 1 {
            NewIncident::new(format!("Incident {}", n), "api")
                .with_severity(Severity::Sev2)
                .with_status(Status::Open)
        } else {
            NewIncident::new(format!("Incident {}", n), "db")
                .with_severity(Severity::Sev3)
                .with_status(Status::Resolved)
        };
        backend.insert(draft.into_payload());
        clock.advance(Duration::minutes(1));
    }
    backend
}

pub fn filter_with_limit(limit: u32) -> FilterState {
    FilterState::default().with_limit(limit)
}

pub fn ids(items: &[Incident]) -> Vec<IncidentId> {
    items.iter().map(|incident| incident.id).collect()
}
