//! Event identity signatures
//!
//! `count` counts events, not deliveries: two deliveries of the same logical
//! event must produce the same signature. This module provides the strategies
//! used to derive that signature from an [`Event`].

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use streamstats_types::{Event, EventId, FieldPath};

/// Trait for extracting an identity signature from an event
///
/// The signature must be deterministic (same event = same signature) and
/// should differ between distinct events.
pub trait SignatureExtractor: Send + Sync {
    fn signature(&self, event: &Event) -> EventId;
}

// ============================================================================
// Content hash
// ============================================================================

/// Signature computed by hashing event data
///
/// Object keys are serialized in sorted order, so the hash does not depend on
/// field order. Excluded keys are dropped at every nesting level.
#[derive(Debug, Clone, Default)]
pub struct ContentHashSignature {
    exclude_fields: Vec<String>,
}

impl ContentHashSignature {
    /// Hash every field
    pub fn sha256() -> Self {
        Self::default()
    }

    /// Hash every field except the given keys (e.g. "timestamp")
    pub fn sha256_excluding(exclude_fields: Vec<String>) -> Self {
        Self { exclude_fields }
    }

    fn filter_fields(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let filtered: Map<String, Value> = map
                    .iter()
                    .filter(|(k, _)| !self.exclude_fields.iter().any(|e| e == *k))
                    .map(|(k, v)| (k.clone(), self.filter_fields(v)))
                    .collect();
                Value::Object(filtered)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(|v| self.filter_fields(v)).collect()),
            _ => value.clone(),
        }
    }

    /// Hash an arbitrary JSON value
    pub fn hash_value(&self, value: &Value) -> EventId {
        // serde_json maps are BTreeMaps: serialization is key-sorted
        let canonical = self.filter_fields(value).to_string();

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        EventId::from_bytes(&hasher.finalize())
    }
}

impl SignatureExtractor for ContentHashSignature {
    fn signature(&self, event: &Event) -> EventId {
        self.hash_value(&event.data)
    }
}

// ============================================================================
// Explicit id with content hash fallback
// ============================================================================

/// Default extractor: the producer-supplied `Event::id`, or a content hash
/// of the data when the event carries none
#[derive(Debug, Clone, Default)]
pub struct ExplicitOrContentHash {
    fallback: ContentHashSignature,
}

impl ExplicitOrContentHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: ContentHashSignature) -> Self {
        Self { fallback }
    }
}

impl SignatureExtractor for ExplicitOrContentHash {
    fn signature(&self, event: &Event) -> EventId {
        match &event.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => self.fallback.signature(event),
        }
    }
}

// ============================================================================
// Field value
// ============================================================================

/// Signature read from a field of the event data, e.g. `request.id`
///
/// Falls back to the content hash when the field is missing.
#[derive(Debug, Clone)]
pub struct FieldSignature {
    path: FieldPath,
    fallback: ContentHashSignature,
}

impl FieldSignature {
    pub fn new(path: FieldPath) -> Self {
        Self {
            path,
            fallback: ContentHashSignature::default(),
        }
    }
}

impl SignatureExtractor for FieldSignature {
    fn signature(&self, event: &Event) -> EventId {
        match event.get(&self.path) {
            Some(Value::String(s)) => EventId::from_string(s.clone()),
            Some(Value::Null) | None => self.fallback.signature(event),
            Some(other) => EventId::from_string(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_is_deterministic() {
        let extractor = ContentHashSignature::sha256();
        let a = Event::new(json!({"user": "a", "amount": 10}));
        let b = Event::new(json!({"amount": 10, "user": "a"}));
        let c = Event::new(json!({"user": "a", "amount": 11}));

        assert_eq!(extractor.signature(&a), extractor.signature(&b));
        assert_ne!(extractor.signature(&a), extractor.signature(&c));
        assert_eq!(extractor.signature(&a).as_str().len(), 64);
    }

    #[test]
    fn test_content_hash_excluding() {
        let extractor = ContentHashSignature::sha256_excluding(vec!["timestamp".to_string()]);
        let a = Event::new(json!({"user": "a", "timestamp": 1}));
        let b = Event::new(json!({"user": "a", "timestamp": 2}));
        assert_eq!(extractor.signature(&a), extractor.signature(&b));
    }

    #[test]
    fn test_explicit_id_wins() {
        let extractor = ExplicitOrContentHash::new();
        let a = Event::new(json!({"v": 1})).with_id("evt-1");
        let b = Event::new(json!({"v": 2})).with_id("evt-1");
        assert_eq!(extractor.signature(&a), EventId::from("evt-1"));
        assert_eq!(extractor.signature(&a), extractor.signature(&b));

        let anonymous = Event::new(json!({"v": 1}));
        assert_eq!(
            extractor.signature(&anonymous),
            ContentHashSignature::sha256().signature(&anonymous)
        );
    }

    #[test]
    fn test_field_signature() {
        let extractor = FieldSignature::new(FieldPath::parse("request.id").unwrap());
        let event = Event::new(json!({"request": {"id": "r-1"}}));
        assert_eq!(extractor.signature(&event), EventId::from("r-1"));

        let numeric = Event::new(json!({"request": {"id": 42}}));
        assert_eq!(extractor.signature(&numeric), EventId::from("42"));

        let missing = Event::new(json!({"other": 1}));
        assert_eq!(extractor.signature(&missing).as_str().len(), 64);
    }
}
