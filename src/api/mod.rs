//! Backend collaborators: the four operations the client core depends on.

pub mod http;
pub mod memory;

pub use http::HttpIncidentApi;
pub use memory::InMemoryIncidentApi;

use crate::error::Result;
use crate::models::{CreateIncidentPayload, Cursor, Incident, IncidentId, Page, UpdateIncidentPayload};
use crate::query::FilterState;
use async_trait::async_trait;

/// Incidents REST API, as seen by the client
#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// LIST: one page of incidents matching `filter`, starting at `cursor`
    async fn list(&self, filter: &FilterState, cursor: Option<&Cursor>) -> Result<Page>;

    /// GET: a single incident; `AppError::NotFound` for unknown ids
    async fn get(&self, id: IncidentId) -> Result<Incident>;

    /// CREATE: persist a new incident and return the canonical record
    async fn create(&self, payload: &CreateIncidentPayload) -> Result<Incident>;

    /// UPDATE: apply the fields present in `payload`
    async fn update(&self, id: IncidentId, payload: &UpdateIncidentPayload) -> Result<Incident>;
}
