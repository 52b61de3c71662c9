//! Physical selectors evaluated by document backends.
//!
//! Filters (see [`crate::Filter`]) name logical attributes; a translator turns
//! them into a [`Selector`] that matches either plaintext fields or blinded
//! index entries, depending on how the store persists documents.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Field that carries blind index entries on an encrypted document.
pub const INDEXED_FIELD: &str = "indexed";

/// One blinded `(name, value)` pair under a given index key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexedAttribute {
    pub index_id: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Field at a dotted path equals `value`, or is an array containing it.
    Field { path: String, value: Value },
    /// The document carries this blinded index entry.
    Indexed(IndexedAttribute),
    And(Vec<Selector>),
    Or(Vec<Selector>),
}

impl Selector {
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Selector::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a raw backend document body.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Selector::Field { path, value } => match resolve_path(doc, path) {
                Some(Value::Array(items)) => items.iter().any(|item| item == value),
                Some(found) => found == value,
                None => false,
            },
            Selector::Indexed(entry) => has_index_entry(doc, entry),
            Selector::And(parts) => parts.iter().all(|s| s.matches(doc)),
            Selector::Or(parts) => parts.iter().any(|s| s.matches(doc)),
        }
    }
}

/// Walk a dotted path (`meta.profileId`) through nested objects.
pub fn resolve_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.get(segment))
}

fn has_index_entry(doc: &Value, entry: &IndexedAttribute) -> bool {
    let Some(Value::Array(groups)) = doc.get(INDEXED_FIELD) else {
        return false;
    };
    groups
        .iter()
        .filter(|group| {
            group.pointer("/hmac/id").and_then(Value::as_str) == Some(entry.index_id.as_str())
        })
        .filter_map(|group| group.get("attributes").and_then(Value::as_array))
        .flatten()
        .any(|attribute| {
            attribute.get("name").and_then(Value::as_str) == Some(entry.name.as_str())
                && attribute.get("value").and_then(Value::as_str) == Some(entry.value.as_str())
        })
}

/// Lay out index entries the way encrypted documents carry them:
/// one group per index key, each listing its blinded attributes.
///
/// ```text
/// [ { "hmac": { "id": <index_id> }, "attributes": [ { "name", "value" }, ... ] } ]
/// ```
pub fn index_entries_to_json(entries: &[IndexedAttribute]) -> Value {
    let mut groups: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.index_id.as_str())
            .or_default()
            .push(json!({ "name": entry.name, "value": entry.value }));
    }
    Value::Array(
        groups
            .into_iter()
            .map(|(index_id, attributes)| {
                json!({ "hmac": { "id": index_id }, "attributes": attributes })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Value {
        json!({
            "content": {
                "id": "urn:1",
                "type": ["VerifiableCredential", "AlumniCredential"]
            },
            "meta": { "profileId": "p1", "displayable": true }
        })
    }

    fn entry(name: &str, value: &str) -> IndexedAttribute {
        IndexedAttribute {
            index_id: "idx-1".into(),
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_resolve_path() {
        let doc = sample_doc();
        assert_eq!(resolve_path(&doc, "meta.profileId"), Some(&json!("p1")));
        assert!(resolve_path(&doc, "meta.parentId").is_none());
        assert!(resolve_path(&doc, "content.id.deeper").is_none());
    }

    #[test]
    fn test_field_scalar_match() {
        let doc = sample_doc();
        assert!(Selector::field("content.id", "urn:1").matches(&doc));
        assert!(!Selector::field("content.id", "urn:2").matches(&doc));
        assert!(Selector::field("meta.displayable", true).matches(&doc));
    }

    #[test]
    fn test_field_array_contains() {
        let doc = sample_doc();
        assert!(Selector::field("content.type", "AlumniCredential").matches(&doc));
        assert!(!Selector::field("content.type", "KingCredential").matches(&doc));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let doc = sample_doc();
        assert!(!Selector::field("meta.parentId", "1234").matches(&doc));
    }

    #[test]
    fn test_and_or() {
        let doc = sample_doc();
        let both = Selector::And(vec![
            Selector::field("meta.profileId", "p1"),
            Selector::field("content.id", "urn:1"),
        ]);
        assert!(both.matches(&doc));

        let wrong_profile = Selector::And(vec![
            Selector::field("meta.profileId", "p2"),
            Selector::field("content.id", "urn:1"),
        ]);
        assert!(!wrong_profile.matches(&doc));

        let either = Selector::Or(vec![
            Selector::field("content.id", "urn:9"),
            Selector::field("content.id", "urn:1"),
        ]);
        assert!(either.matches(&doc));

        assert!(Selector::And(vec![]).matches(&doc));
        assert!(!Selector::Or(vec![]).matches(&doc));
    }

    #[test]
    fn test_indexed_entry_match() {
        let entries = vec![entry("n1", "v1"), entry("n2", "v2")];
        let doc = json!({ "indexed": index_entries_to_json(&entries) });

        assert!(Selector::Indexed(entry("n1", "v1")).matches(&doc));
        assert!(Selector::Indexed(entry("n2", "v2")).matches(&doc));
        // name and value must come from the same attribute
        assert!(!Selector::Indexed(entry("n1", "v2")).matches(&doc));
    }

    #[test]
    fn test_indexed_entry_wrong_index_id() {
        let doc = json!({ "indexed": index_entries_to_json(&[entry("n1", "v1")]) });
        let other_key = IndexedAttribute {
            index_id: "idx-2".into(),
            ..entry("n1", "v1")
        };
        assert!(!Selector::Indexed(other_key).matches(&doc));
    }

    #[test]
    fn test_indexed_on_plain_document() {
        assert!(!Selector::Indexed(entry("n1", "v1")).matches(&sample_doc()));
    }

    #[test]
    fn test_index_entries_grouped_by_key() {
        let mut second = entry("n3", "v3");
        second.index_id = "idx-0".into();
        let json = index_entries_to_json(&[entry("n1", "v1"), second, entry("n2", "v2")]);
        let groups = json.as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["hmac"]["id"], "idx-0");
        assert_eq!(groups[1]["attributes"].as_array().unwrap().len(), 2);
    }
}
