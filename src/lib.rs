//! Incident console: a client for the incidents REST API.
//!
//! Keeps a local cache of list pages and incident records consistent with the
//! server while the user filters, pages with opaque cursors, and creates or
//! edits incidents.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod mutation;
pub mod query;

pub use api::{HttpIncidentApi, InMemoryIncidentApi, IncidentApi};
pub use config::ClientConfig;
pub use error::{AppError, Result};
pub use mutation::{IncidentEdit, MutationCoordinator};
pub use query::{CacheStore, DetailQuery, FilterCodec, FilterState, ListLocation, ListQuery};
