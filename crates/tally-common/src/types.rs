//! Event model and newtype wrappers for domain modeling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type used throughout the engine. Always UTC.
pub type Timestamp = DateTime<Utc>;

/// Opaque identifier of a measured entity (a published profile).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Creates an entity id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identifier of a single event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Creates an event id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random event id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of interaction an event records.
///
/// The set is open: unknown wire names are preserved in [`EventType::Other`]
/// so newer producers never break older readers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// The entity was viewed.
    View,
    /// The entity was shared.
    Share,
    /// A contact link on the entity was clicked.
    ContactClick,
    /// A service listed on the entity was viewed.
    ServiceView,
    /// Any other event type, kept verbatim.
    Other(String),
}

impl EventType {
    /// Wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::View => "view",
            Self::Share => "share",
            Self::ContactClick => "contact_click",
            Self::ServiceView => "service_view",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "view" => Self::View,
            "share" => Self::Share,
            "contact_click" => Self::ContactClick,
            "service_view" => Self::ServiceView,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Free-form event metadata.
pub type EventMetadata = BTreeMap<String, serde_json::Value>;

/// An immutable interaction record as stored by the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Entity the event belongs to.
    pub entity_id: EntityId,
    /// Kind of interaction.
    pub event_type: EventType,
    /// When the interaction happened.
    pub occurred_at: Timestamp,
    /// Optional producer-supplied metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl Event {
    /// Creates an event without metadata.
    pub fn new(
        id: impl Into<EventId>,
        entity_id: impl Into<EntityId>,
        event_type: EventType,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            event_type,
            occurred_at,
            metadata: None,
        }
    }

    /// Attaches metadata to the event.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns true if the event is of the given type.
    #[must_use]
    pub fn is(&self, event_type: &EventType) -> bool {
        &self.event_type == event_type
    }
}
