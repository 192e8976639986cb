//! The outer record wrapping a domain payload for publication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EventId;

use super::payload::EventPayload;
use super::router::subject_for;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub subject: String,
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub causation_id: Option<String>,
    pub version: u32,
}

impl EventEnvelope {
    /// Wrap `payload`, deriving its subject via the router. `version`
    /// defaults to 1.
    pub fn new(payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        let subject = subject_for(&payload);
        Self {
            id: EventId::generate(),
            subject,
            payload,
            timestamp,
            correlation_id: None,
            causation_id: None,
            version: 1,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_causation(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }
}
