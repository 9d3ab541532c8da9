//! Event envelope flowing through the aggregation engine

use crate::fields::FieldPath;
use crate::ids::{EventId, GroupFingerprint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic event: a JSON document plus envelope metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Explicit identity signature supplied by the producer
    ///
    /// Re-deliveries of the same logical event must carry the same id. When
    /// absent, consumers fall back to hashing `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,

    /// Event data payload
    #[serde(default = "empty_object")]
    pub data: Value,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,

    /// Group fingerprint tag, set by the aggregator that folded this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<GroupFingerprint>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Event {
    /// Create an event around a data payload
    pub fn new(data: Value) -> Self {
        Self {
            id: None,
            data,
            meta: Map::new(),
            fingerprint: None,
        }
    }

    /// Create an event with an empty data object
    pub fn empty() -> Self {
        Self::new(empty_object())
    }

    /// Attach an explicit identity signature
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add metadata to the event
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Read a value from the data payload
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        path.read(&self.data)
    }

    /// Write a value into the data payload
    pub fn set(&mut self, path: &FieldPath, value: Value) {
        path.write(&mut self.data, value);
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Event {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builders() {
        let event = Event::new(json!({"user": "a"}))
            .with_id("evt-1")
            .with_meta("source", "tail");

        assert_eq!(event.id, Some(EventId::from("evt-1")));
        assert_eq!(event.meta.get("source"), Some(&json!("tail")));
        assert!(event.fingerprint.is_none());
    }

    #[test]
    fn test_event_get_set() {
        let mut event = Event::empty();
        let path = FieldPath::parse("http.status").unwrap();
        event.set(&path, json!(200));
        assert_eq!(event.get(&path), Some(&json!(200)));
        assert_eq!(event.data, json!({"http": {"status": 200}}));
    }

    #[test]
    fn test_event_deserialize_defaults() {
        let event: Event = serde_json::from_str(r#"{"data": {"x": 1}}"#).unwrap();
        assert!(event.id.is_none());
        assert!(event.meta.is_empty());

        let event: Event = serde_json::from_str("{}").unwrap();
        assert_eq!(event.data, json!({}));
    }

    #[test]
    fn test_event_serialization_skips_empty_envelope() {
        let event = Event::new(json!({"x": 1}));
        assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"data":{"x":1}}"#);
    }
}
