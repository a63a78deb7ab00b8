use serde::{Deserialize, Serialize};
use std::fmt;

/// One record returned by `LookupEvents`.
///
/// Only the payload, id and name drive discovery; the rest is carried along
/// so a dump round-trips without loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,
    /// ISO-8601 string from the CLI, epoch seconds from the SDKs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<EventResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_trail_event: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

impl RawEvent {
    pub fn new(
        event_id: impl Into<String>,
        event_name: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Some(event_id.into()),
            event_name: Some(event_name.into()),
            cloud_trail_event: Some(payload.into()),
            ..Self::default()
        }
    }

    pub fn event_id(&self) -> &str {
        self.event_id.as_deref().unwrap_or_default()
    }

    /// The API action (`EventName`), e.g. `RunInstances`.
    pub fn action(&self) -> &str {
        self.event_name.as_deref().unwrap_or_default()
    }

    pub fn payload(&self) -> &str {
        self.cloud_trail_event.as_deref().unwrap_or_default()
    }
}

/// Opaque continuation handle; absent on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of results, in the order the source returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventPage {
    pub events: Vec<RawEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<PageToken>,
}

impl EventPage {
    pub fn new(events: Vec<RawEvent>, next_token: Option<PageToken>) -> Self {
        Self { events, next_token }
    }

    pub fn last(events: Vec<RawEvent>) -> Self {
        Self::new(events, None)
    }
}
