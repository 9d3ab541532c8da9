//! Group keys and their fingerprints

use crate::fields::FieldResolver;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use streamstats_types::{Event, FieldPath, GroupFingerprint};

/// Canonical string form of a grouping value
///
/// Strings render as their raw content, every other value as its compact JSON
/// text. `"1"` and `1` therefore land in the same group, as do a missing
/// field and an explicit `null`.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered (field, value) pairs identifying one aggregation bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupKey {
    fields: Vec<(String, Value)>,
}

impl GroupKey {
    /// Resolve every grouping field of `event`; misses become `null`
    pub fn resolve(group_by: &[FieldPath], event: &Event, resolver: &dyn FieldResolver) -> Self {
        let fields = group_by
            .iter()
            .map(|path| {
                let value = resolver.read(event, path).unwrap_or(Value::Null);
                (path.as_str().to_string(), value)
            })
            .collect();
        Self { fields }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Canonical strings in declaration order
    pub fn canonical_parts(&self) -> Vec<String> {
        self.fields.iter().map(|(_, v)| canonical_string(v)).collect()
    }

    pub fn fingerprint(&self) -> GroupFingerprint {
        GroupFingerprint::from_parts(self.canonical_parts())
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Value of one grouping field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Grouping values as a JSON object, for display
    pub fn to_object(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
