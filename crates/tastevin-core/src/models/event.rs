use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tasting event proposed by a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_by: String,

    #[serde(default)]
    pub finalized: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_time_option_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(title: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            description: None,
            created_by: created_by.into(),
            finalized: false,
            finalized_at: None,
            selected_time_option_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description_opt(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// A candidate time slot for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOption {
    pub id: Uuid,
    pub event_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Input for [`crate::Database::create_event`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub created_by: String,

    #[serde(default)]
    pub time_options: Vec<NewTimeOption>,

    #[serde(default)]
    pub invitees: Vec<NewInvitee>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewTimeOption {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvitee {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

impl NewInvitee {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
        }
    }
}
