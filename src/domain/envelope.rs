//! Event envelope and metadata
//!
//! The envelope is the wire shape of an event on the message bus. Saga
//! steps are independently subscribed processes, so correlation identifiers
//! (the `position_id` threading the order workflow together) travel in the
//! serialized metadata map rather than in any shared in-memory state.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata key used to correlate order events with their position.
pub const POSITION_ID_KEY: &str = "position_id";

/// Free-form key/value metadata attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMetadata(BTreeMap<String, String>);

impl EventMetadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the position correlation identifier
    pub fn with_position_id(mut self, position_id: Uuid) -> Self {
        self.0
            .insert(POSITION_ID_KEY.to_string(), position_id.to_string());
        self
    }

    /// Read the position correlation identifier, if present and well-formed
    pub fn position_id(&self) -> Option<Uuid> {
        self.0.get(POSITION_ID_KEY).and_then(|v| v.parse().ok())
    }

    /// Read an arbitrary metadata value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert an arbitrary metadata value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Wire shape of an event published on the message bus.
///
/// Payload fields are flattened next to the envelope fields, so consumers
/// can decode the payload back into its typed event via the `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "EventMetadata::is_empty")]
    pub metadata: EventMetadata,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build a synthetic coordination envelope.
    ///
    /// Coordination events are published directly by saga steps and never
    /// enter the event log, so they carry version 0.
    pub fn coordination(
        aggregate_id: Uuid,
        aggregate_type: &str,
        event_type: &str,
        metadata: EventMetadata,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: event_type.to_string(),
            version: 0,
            timestamp: Utc::now(),
            metadata,
            payload,
        }
    }

    /// Decode the flattened payload back into a typed event or payload struct
    pub fn decode_payload<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
