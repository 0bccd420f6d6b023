use crate::models::{normalize_text, Incident, Severity, Status, UpdateIncidentPayload};

/// Edit-form values; `None` means the field was left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentEdit {
    pub title: Option<String>,
    pub service: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    /// Blank clears the owner
    pub owner: Option<String>,
    /// Blank clears the summary
    pub summary: Option<String>,
}

impl IncidentEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Fields of `edit` that differ from `current`.
///
/// Without a displayed record every touched field is sent.
pub fn minimal_update(current: Option<&Incident>, edit: &IncidentEdit) -> UpdateIncidentPayload {
    let title = edit.title.as_deref().map(|t| t.trim().to_string());
    let service = edit.service.as_deref().map(|s| s.trim().to_string());
    let owner = edit.owner.as_deref().map(|o| normalize_text(Some(o)));
    let summary = edit.summary.as_deref().map(|s| normalize_text(Some(s)));

    match current {
        None => UpdateIncidentPayload {
            title,
            service,
            severity: edit.severity,
            status: edit.status,
            owner,
            summary,
        },
        Some(current) => UpdateIncidentPayload {
            title: title.filter(|t| *t != current.title),
            service: service.filter(|s| *s != current.service),
            severity: edit.severity.filter(|s| *s != current.severity),
            status: edit.status.filter(|s| *s != current.status),
            owner: owner.filter(|o| *o != current.owner),
            summary: summary.filter(|s| *s != current.summary),
        },
    }
}
