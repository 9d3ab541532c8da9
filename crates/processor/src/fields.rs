//! Field resolution against events
//!
//! The aggregator never touches event data directly; it goes through a
//! [`FieldResolver`] so embedders can resolve paths against something other
//! than the JSON payload (metadata, computed fields, external lookups).

use serde_json::Value;
use streamstats_types::{Event, FieldPath};

/// Read/write access to event fields
///
/// Reads of a missing path return `None`. Writes never fail.
pub trait FieldResolver: Send + Sync {
    fn read(&self, event: &Event, path: &FieldPath) -> Option<Value>;

    fn write(&self, event: &mut Event, path: &FieldPath, value: Value);
}

/// Resolves paths against `Event::data`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFieldResolver;

impl FieldResolver for JsonFieldResolver {
    fn read(&self, event: &Event, path: &FieldPath) -> Option<Value> {
        event.get(path).cloned()
    }

    fn write(&self, event: &mut Event, path: &FieldPath, value: Value) {
        event.set(path, value);
    }
}

/// Resolves paths against `Event::meta` first, then `Event::data`
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaFirstResolver;

impl FieldResolver for MetaFirstResolver {
    fn read(&self, event: &Event, path: &FieldPath) -> Option<Value> {
        event
            .meta
            .get(path.as_str())
            .cloned()
            .or_else(|| event.get(path).cloned())
    }

    fn write(&self, event: &mut Event, path: &FieldPath, value: Value) {
        event.set(path, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_resolver() {
        let resolver = JsonFieldResolver;
        let mut event = Event::new(json!({"a": {"b": [1, 2]}}));
        let path = FieldPath::parse("a.b[1]").unwrap();
        assert_eq!(resolver.read(&event, &path), Some(json!(2)));

        let missing = FieldPath::parse("a.c").unwrap();
        assert_eq!(resolver.read(&event, &missing), None);

        resolver.write(&mut event, &FieldPath::parse("x.y").unwrap(), json!("z"));
        assert_eq!(event.data["x"]["y"], json!("z"));
    }

    #[test]
    fn test_meta_first_resolver() {
        let resolver = MetaFirstResolver;
        let event = Event::new(json!({"host": "data"})).with_meta("host", "meta");
        let path = FieldPath::parse("host").unwrap();
        assert_eq!(resolver.read(&event, &path), Some(json!("meta")));

        let event = Event::new(json!({"host": "data"}));
        assert_eq!(resolver.read(&event, &path), Some(json!("data")));
    }
}
