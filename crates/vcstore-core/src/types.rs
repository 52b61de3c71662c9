use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Typed identifiers
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    ProfileId,
    "Owner scope under which documents are stored and queried."
);
define_id!(CredentialId, "The `id` URI of a verifiable credential.");
define_id!(DocumentId, "Backend-assigned identity of a stored document.");

impl DocumentId {
    /// Fresh random identity, for backends that assign their own ids.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Attribute names addressable by filters and blind indexes
// ---------------------------------------------------------------------------

pub mod attr {
    pub const CONTENT_ID: &str = "content.id";
    pub const CONTENT_TYPE: &str = "content.type";
    pub const META_PROFILE_ID: &str = "meta.profileId";
    pub const META_ISSUER: &str = "meta.issuer";
    pub const META_PARENT_ID: &str = "meta.parentId";
    pub const META_DISPLAYABLE: &str = "meta.displayable";

    /// Attributes that receive blind index entries in encrypted mode.
    pub const INDEXED: [&str; 6] = [
        CONTENT_ID,
        CONTENT_TYPE,
        META_PROFILE_ID,
        META_ISSUER,
        META_PARENT_ID,
        META_DISPLAYABLE,
    ];
}

// ---------------------------------------------------------------------------
// OneOrMany: scalar-or-sequence JSON shapes
// ---------------------------------------------------------------------------

/// A JSON value that may be given either as a single item or as an array.
///
/// Normalized once with [`OneOrMany::into_vec`]; nothing downstream looks at
/// the original shape.
///
/// `Many` is tried first: serde lets a struct deserialize from a sequence,
/// so `[{..}]` would otherwise be read as a single malformed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        OneOrMany::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

// ---------------------------------------------------------------------------
// Issuer: URI or object with an `id`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Issuer {
    Uri(String),
    Object {
        id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl Issuer {
    /// The issuer URI, whichever shape it was given in.
    pub fn id(&self) -> &str {
        match self {
            Issuer::Uri(uri) => uri,
            Issuer::Object { id, .. } => id,
        }
    }
}

// ---------------------------------------------------------------------------
// Credential: opaque signed claims document
// ---------------------------------------------------------------------------

/// A verifiable credential, kept as the exact JSON the caller supplied so a
/// stored credential reads back deep-equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(Value);

impl Credential {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Normalized issuer URI.
    ///
    /// Fails with `Validation` when `issuer` is missing, empty, or neither a
    /// string nor an object carrying a string `id`.
    pub fn issuer_id(&self) -> StoreResult<String> {
        let raw = match self.0.get("issuer") {
            None | Some(Value::Null) => {
                return Err(StoreError::Validation(
                    "a verifiable credential must have an issuer property".into(),
                ))
            }
            Some(raw) => raw,
        };

        let issuer: Issuer = serde_json::from_value(raw.clone()).map_err(|_| {
            StoreError::Validation(
                "the issuer property must be either a URI or an object containing an id property"
                    .into(),
            )
        })?;

        if issuer.id().is_empty() {
            return Err(StoreError::Validation(
                "the issuer property must not be empty".into(),
            ));
        }
        Ok(issuer.id().to_string())
    }
}

// ---------------------------------------------------------------------------
// Meta: repository-managed metadata
// ---------------------------------------------------------------------------

/// Metadata stored next to a credential.
///
/// `profile_id` and `issuer` are always overwritten by the repository on
/// insert; whatever a caller put there is discarded. `extra` must not carry
/// keys that shadow the typed fields, see [`Meta::strip_shadowing_extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayable: Option<bool>,

    /// Caller-defined metadata, persisted untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    /// Serialized names of the typed fields.
    pub const FIELDS: [&'static str; 4] = ["profileId", "issuer", "parentId", "displayable"];

    /// Remove `extra` entries named like a typed field. Flattened after the
    /// typed fields, they would otherwise replace them in the stored body.
    /// Returns the removed keys.
    pub fn strip_shadowing_extra(&mut self) -> Vec<String> {
        Self::FIELDS
            .iter()
            .filter(|key| self.extra.remove(**key).is_some())
            .map(|key| key.to_string())
            .collect()
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_displayable(mut self, displayable: bool) -> Self {
        self.displayable = Some(displayable);
        self
    }
}

// ---------------------------------------------------------------------------
// CredentialRecord / StoredDocument
// ---------------------------------------------------------------------------

/// The persisted unit: `{content, meta}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub content: Credential,
    pub meta: Meta,
}

impl CredentialRecord {
    pub fn to_value(&self) -> StoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A credential record as read back from a backend, with the identity the
/// backend assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub content: Credential,
    pub meta: Meta,
}

impl StoredDocument {
    pub fn from_record(id: DocumentId, record: CredentialRecord) -> Self {
        Self {
            id,
            content: record.content,
            meta: record.meta,
        }
    }

    /// Decode a plaintext `{content, meta}` body.
    pub fn from_body(id: DocumentId, body: Value) -> StoreResult<Self> {
        let record: CredentialRecord = serde_json::from_value(body)?;
        Ok(Self::from_record(id, record))
    }
}

// ---------------------------------------------------------------------------
// Filter: logical equality constraints, before translation
// ---------------------------------------------------------------------------

/// One logical constraint on a named attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `name == value`; for array attributes, any element equal to `value`.
    Equals { name: String, value: Value },
    /// `name` equal to at least one of `values`.
    AnyOf { name: String, values: Vec<Value> },
}

/// A conjunction of clauses. An empty filter is unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Equals {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn any_of(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::AnyOf {
            name: name.into(),
            values,
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_or_many_scalar() {
        let v: OneOrMany<String> = serde_json::from_value(json!("AlumniCredential")).unwrap();
        assert_eq!(v.into_vec(), vec!["AlumniCredential".to_string()]);
    }

    #[test]
    fn test_one_or_many_array() {
        let v: OneOrMany<String> = serde_json::from_value(json!(["A", "B"])).unwrap();
        assert_eq!(v.into_vec(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_one_or_many_array_of_objects() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Item {
            #[serde(default)]
            id: Option<String>,
            #[serde(default)]
            flag: bool,
        }

        let v: OneOrMany<Item> =
            serde_json::from_value(json!([{"id": "a", "flag": true}, {}])).unwrap();
        assert_eq!(
            v.into_vec(),
            vec![
                Item { id: Some("a".into()), flag: true },
                Item { id: None, flag: false },
            ]
        );

        let v: OneOrMany<Item> = serde_json::from_value(json!({"id": "b"})).unwrap();
        assert_eq!(v.into_vec().len(), 1);
    }

    #[test]
    fn test_issuer_string() {
        let cred = Credential::new(json!({"id": "urn:1", "issuer": "urn:issuer:A"}));
        assert_eq!(cred.issuer_id().unwrap(), "urn:issuer:A");
    }

    #[test]
    fn test_issuer_object() {
        let cred = Credential::new(json!({
            "id": "urn:1",
            "issuer": {"id": "did:example:university", "name": "Example University"}
        }));
        assert_eq!(cred.issuer_id().unwrap(), "did:example:university");
    }

    #[test]
    fn test_issuer_missing() {
        let cred = Credential::new(json!({"id": "urn:1"}));
        assert!(matches!(cred.issuer_id(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_issuer_object_without_id() {
        let cred = Credential::new(json!({"id": "urn:1", "issuer": {"name": "nobody"}}));
        assert!(matches!(cred.issuer_id(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_issuer_object_with_numeric_id() {
        let cred = Credential::new(json!({"id": "urn:1", "issuer": {"id": 42}}));
        assert!(matches!(cred.issuer_id(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_issuer_empty_string() {
        let cred = Credential::new(json!({"id": "urn:1", "issuer": ""}));
        assert!(matches!(cred.issuer_id(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_meta_strip_shadowing_extra() {
        let mut meta = Meta {
            issuer: Some("urn:issuer:A".into()),
            ..Meta::default()
        };
        meta.extra.insert("issuer".into(), json!("urn:forged"));
        meta.extra.insert("profileId".into(), json!("p-other"));
        meta.extra.insert("label".into(), json!("diploma"));

        let mut removed = meta.strip_shadowing_extra();
        removed.sort();
        assert_eq!(removed, vec!["issuer", "profileId"]);

        let body = serde_json::to_value(&meta).unwrap();
        assert_eq!(body["issuer"], "urn:issuer:A");
        assert!(body.get("profileId").is_none());
        assert_eq!(body["label"], "diploma");
    }

    #[test]
    fn test_meta_camel_case_and_extra() {
        let meta: Meta = serde_json::from_value(json!({
            "profileId": "p1",
            "parentId": "1234",
            "displayable": true,
            "label": "diploma"
        }))
        .unwrap();
        assert_eq!(meta.profile_id, Some(ProfileId::new("p1")));
        assert_eq!(meta.parent_id.as_deref(), Some("1234"));
        assert_eq!(meta.displayable, Some(true));
        assert_eq!(meta.extra.get("label"), Some(&json!("diploma")));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["profileId"], "p1");
        assert_eq!(back["label"], "diploma");
    }

    #[test]
    fn test_stored_document_from_body() {
        let body = json!({
            "content": {"id": "urn:1", "issuer": "urn:issuer:A"},
            "meta": {"profileId": "p1", "issuer": "urn:issuer:A"}
        });
        let doc = StoredDocument::from_body(DocumentId::new("d1"), body).unwrap();
        assert_eq!(doc.content.id(), Some("urn:1"));
        assert_eq!(doc.meta.issuer.as_deref(), Some("urn:issuer:A"));
    }

    #[test]
    fn test_filter_builder() {
        let filter = Filter::new()
            .eq(attr::META_PROFILE_ID, "p1")
            .any_of(attr::CONTENT_TYPE, vec![json!("A"), json!("B")]);
        assert_eq!(filter.clauses().len(), 2);
        assert!(matches!(
            &filter.clauses()[1],
            Clause::AnyOf { name, values } if name == attr::CONTENT_TYPE && values.len() == 2
        ));
        assert!(Filter::new().clauses().is_empty());
    }

    #[test]
    fn test_document_id_generate_unique() {
        assert_ne!(DocumentId::generate(), DocumentId::generate());
    }
}
