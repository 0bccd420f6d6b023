use super::Incident;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, server-issued pagination token.
///
/// Treated as an uninterpreted string: it is never parsed or compared for
/// ordering, only echoed back to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// An empty token is the same as no cursor at all
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a cursor-paginated list response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<Incident>,
    #[serde(default)]
    pub next_cursor: Option<Cursor>,
    #[serde(default)]
    pub has_more: bool,
}

impl Page {
    pub fn new(items: Vec<Incident>, next_cursor: Option<Cursor>) -> Self {
        Self {
            items,
            has_more: next_cursor.is_some(),
            next_cursor,
        }
    }

    /// Enforce `has_more == next_cursor.is_some()` on pages received from the wire
    pub fn normalized(mut self) -> Self {
        if !self.has_more {
            self.next_cursor = None;
        }
        if self.next_cursor.is_none() {
            self.has_more = false;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
