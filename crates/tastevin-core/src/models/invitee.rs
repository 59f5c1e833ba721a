use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A guest invited to an event, identified externally by an opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitee {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Invitee {
    pub fn new(event_id: Uuid, name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id,
            name: name.into(),
            email: None,
            token: token.into(),
            responded_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_email_opt(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }
}

/// One availability vote of an invitee for a time option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub time_option_id: Uuid,
    pub available: bool,
}
