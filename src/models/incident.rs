use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Server-assigned incident identifier
pub type IncidentId = i64;

/// Maximum owner length accepted by the backend
pub const MAX_OWNER_LEN: usize = 100;

/// Represents an incident as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier
    pub id: IncidentId,

    /// Human-readable title
    pub title: String,

    /// Affected service
    pub service: String,

    /// Severity level
    pub severity: Severity,

    /// Current status
    pub status: Status,

    /// Responsible person
    pub owner: Option<String>,

    /// Free-form summary
    pub summary: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Sev1, // Critical - customer facing outage
    Sev2, // Major degradation
    #[default]
    Sev3, // Minor impact
    Sev4, // Informational
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Open,
    Mitigated,
    Resolved,
}

/// Raw create-form input, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewIncident {
    pub title: String,
    pub service: String,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub owner: Option<String>,
    pub summary: Option<String>,
}

impl NewIncident {
    pub fn new(title: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            service: service.into(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Trim every field; blank optional text becomes absent
    pub fn into_payload(self) -> CreateIncidentPayload {
        CreateIncidentPayload {
            title: self.title.trim().to_string(),
            service: self.service.trim().to_string(),
            severity: self.severity.unwrap_or_default(),
            status: Some(self.status.unwrap_or_default()),
            owner: normalize_text(self.owner.as_deref()),
            summary: normalize_text(self.summary.as_deref()),
        }
    }
}

/// Body of `POST /api/incidents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateIncidentPayload {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,

    #[validate(length(min = 1, max = 100, message = "Service is required"))]
    pub service: String,

    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[validate(length(max = 100))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Body of `PATCH /api/incidents/{id}`: only the fields present are changed.
///
/// `owner` and `summary` distinguish "leave unchanged" (`None`) from
/// "clear" (`Some(None)`, serialized as `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateIncidentPayload {
    #[validate(length(min = 1, max = 255, message = "Title cannot be blank"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Service cannot be blank"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_clearable"
    )]
    pub owner: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_clearable"
    )]
    pub summary: Option<Option<String>>,
}

impl UpdateIncidentPayload {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.service.is_none()
            && self.severity.is_none()
            && self.status.is_none()
            && self.owner.is_none()
            && self.summary.is_none()
    }

    /// Names of the fields carried by this payload
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.service.is_some() {
            fields.push("service");
        }
        if self.severity.is_some() {
            fields.push("severity");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.owner.is_some() {
            fields.push("owner");
        }
        if self.summary.is_some() {
            fields.push("summary");
        }
        fields
    }
}

/// A present `null` means "clear", an absent field means "unchanged"
fn deserialize_clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Trimmed text, with blank input mapped to `None`
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(Severity::Sev1.to_string(), "SEV1");
        assert_eq!(Severity::from_str("SEV4").unwrap(), Severity::Sev4);
        assert_eq!(Status::from_str("MITIGATED").unwrap(), Status::Mitigated);
        assert!(Status::from_str("closed").is_err());

        assert_eq!(serde_json::to_string(&Status::Resolved).unwrap(), "\"RESOLVED\"");
        let severity: Severity = serde_json::from_str("\"SEV2\"").unwrap();
        assert_eq!(severity, Severity::Sev2);
    }

    #[test]
    fn test_incident_deserializes_backend_shape() {
        let json = r#"{
            "id": 42,
            "title": "Checkout latency",
            "service": "payments",
            "severity": "SEV2",
            "status": "OPEN",
            "owner": null,
            "summary": "p99 above 2s",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:05:00Z"
        }"#;

        let incident: Incident = serde_json::from_str(json).unwrap();
        assert_eq!(incident.id, 42);
        assert_eq!(incident.owner, None);
        assert_eq!(incident.severity, Severity::Sev2);
        assert_eq!(incident.status, Status::Open);
    }

    #[test]
    fn test_new_incident_normalization() {
        let payload = NewIncident::new("  Disk full  ", " storage ")
            .with_owner("   ")
            .with_summary(" /var at 100% ")
            .into_payload();

        assert_eq!(payload.title, "Disk full");
        assert_eq!(payload.service, "storage");
        assert_eq!(payload.severity, Severity::Sev3);
        assert_eq!(payload.status, Some(Status::Open));
        assert_eq!(payload.owner, None);
        assert_eq!(payload.summary.as_deref(), Some("/var at 100%"));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_create_payload_requires_title_and_service() {
        let payload = NewIncident::new("   ", "api").into_payload();
        assert!(payload.validate().is_err());

        let payload = NewIncident::new("Outage", "").into_payload();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_update_payload_serializes_only_present_fields() {
        let payload = UpdateIncidentPayload {
            status: Some(Status::Resolved),
            owner: Some(None),
            ..Default::default()
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"status": "RESOLVED", "owner": null}));
        assert_eq!(payload.changed_fields(), vec!["status", "owner"]);
        assert!(!payload.is_empty());
        assert!(UpdateIncidentPayload::default().is_empty());
    }

    #[test]
    fn test_update_payload_distinguishes_clear_from_absent() {
        let payload: UpdateIncidentPayload =
            serde_json::from_str(r#"{"owner": null, "status": "OPEN"}"#).unwrap();
        assert_eq!(payload.owner, Some(None));
        assert_eq!(payload.summary, None);
        assert_eq!(payload.status, Some(Status::Open));
    }
}
