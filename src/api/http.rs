use super::IncidentApi;
use crate::config::ApiConfig;
use crate::error::{AppError, Result};
use crate::models::{CreateIncidentPayload, Cursor, Incident, IncidentId, Page, UpdateIncidentPayload};
use crate::query::FilterState;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const INCIDENTS_PATH: &str = "/api/incidents";

/// REST client for the incidents API
#[derive(Debug, Clone)]
pub struct HttpIncidentApi {
    client: Client,
    base_url: String,
}

/// Error body returned by the backend for non-success responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        match self.detail {
            Some(serde_json::Value::String(detail)) => Some(detail),
            _ => self.message,
        }
    }
}

impl HttpIncidentApi {
    /// Create a new client
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Url::parse(&config.base_url)
            .map_err(|e| AppError::Configuration(format!("Invalid API base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| AppError::Configuration(format!("Invalid request URL: {}", e)))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AppError::Serialization(format!("Invalid response body: {}", e)));
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message);

        warn!(
            status_code = status.as_u16(),
            message = ?message,
            "Incidents API request failed"
        );

        if status == StatusCode::NOT_FOUND {
            Err(AppError::NotFound(
                message.unwrap_or_else(|| "Incident not found".to_string()),
            ))
        } else {
            Err(AppError::server(status.as_u16(), message))
        }
    }
}

#[async_trait]
impl IncidentApi for HttpIncidentApi {
    async fn list(&self, filter: &FilterState, cursor: Option<&Cursor>) -> Result<Page> {
        let mut url = self.url(INCIDENTS_PATH)?;
        url.query_pairs_mut()
            .extend_pairs(filter.to_request_params(cursor));

        debug!(url = %url, "Listing incidents");
        let page: Page = self.send(self.client.get(url)).await?;
        Ok(page.normalized())
    }

    async fn get(&self, id: IncidentId) -> Result<Incident> {
        let url = self.url(&format!("{}/{}", INCIDENTS_PATH, id))?;
        debug!(incident_id = id, "Fetching incident");
        self.send(self.client.get(url)).await
    }

    async fn create(&self, payload: &CreateIncidentPayload) -> Result<Incident> {
        let url = self.url(INCIDENTS_PATH)?;
        debug!(title = %payload.title, service = %payload.service, "Creating incident");
        self.send(self.client.post(url).json(payload)).await
    }

    async fn update(&self, id: IncidentId, payload: &UpdateIncidentPayload) -> Result<Incident> {
        let url = self.url(&format!("{}/{}", INCIDENTS_PATH, id))?;
        debug!(
            incident_id = id,
            fields = ?payload.changed_fields(),
            "Updating incident"
        );
        self.send(self.client.patch(url).json(payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpIncidentApi::new(&config),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let config = ApiConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        };
        let api = HttpIncidentApi::new(&config).unwrap();
        assert_eq!(
            api.url("/api/incidents/4").unwrap().as_str(),
            "http://localhost:8000/api/incidents/4"
        );
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": "Incident not found", "message": "x"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Incident not found"));

        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"loc": ["body"]}]}"#).unwrap();
        assert_eq!(body.into_message(), None);

        let body: ErrorBody = serde_json::from_str(r#"{"message": "Rate limited"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Rate limited"));
    }
}
