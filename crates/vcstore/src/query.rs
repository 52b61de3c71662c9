//! Query-by-example compilation.
//!
//! A request names credential types and, optionally, trusted issuers per
//! query item. Each item compiles to one [`SubQuery`]: the `types × issuers`
//! cross product as a list of equality [`Candidate`]s, any one of which
//! satisfies the item. Nothing here touches storage; every shape error is
//! raised before a lookup is dispatched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vcstore_core::{attr, Filter, OneOrMany, ProfileId, StoreError, StoreResult};

/// The only query type `match` understands.
pub const QUERY_BY_EXAMPLE: &str = "QueryByExample";

/// Which listed trusted issuers constrain a query item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerPolicy {
    /// Every listed issuer is eligible, whatever its `required` flag.
    #[default]
    AnyListed,
    /// Only `required: true` issuers are eligible. An item with none is
    /// issuer-wildcard.
    RequiredOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryByExample {
    pub credential_query: OneOrMany<CredentialQueryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialQueryItem {
    pub example: Example,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_issuer: Option<OneOrMany<TrustedIssuer>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    #[serde(rename = "type")]
    pub types: OneOrMany<String>,

    /// Other example attributes. Accepted, not matched on.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A trusted issuer entry as supplied. `id` is kept loose so a missing or
/// non-string id is reported as an unsupported shape, not a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustedIssuer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default)]
    pub required: bool,
}

impl TrustedIssuer {
    pub fn new(id: impl Into<String>, required: bool) -> Self {
        Self {
            id: Some(Value::String(id.into())),
            required,
        }
    }

    fn issuer_id(&self) -> StoreResult<&str> {
        match &self.id {
            Some(Value::String(id)) if !id.is_empty() => Ok(id),
            Some(other) => Err(StoreError::NotSupported(format!(
                "trusted issuer id must be a non-empty string, got {}",
                other
            ))),
            None => Err(StoreError::NotSupported(
                "trusted issuer without an id is not supported".into(),
            )),
        }
    }
}

impl CredentialQueryItem {
    pub fn new(types: impl Into<OneOrMany<String>>) -> Self {
        Self {
            example: Example {
                types: types.into(),
                extra: Map::new(),
            },
            trusted_issuer: None,
        }
    }

    pub fn with_trusted_issuer(mut self, issuer: TrustedIssuer) -> Self {
        let mut issuers = self
            .trusted_issuer
            .take()
            .map(OneOrMany::into_vec)
            .unwrap_or_default();
        issuers.push(issuer);
        self.trusted_issuer = Some(OneOrMany::Many(issuers));
        self
    }
}

impl QueryByExample {
    pub fn new(items: Vec<CredentialQueryItem>) -> Self {
        Self {
            credential_query: OneOrMany::Many(items),
        }
    }

    /// Parse a raw `{type, credentialQuery}` request.
    ///
    /// `InvalidArgument` if the request or its `type` is missing,
    /// `UnsupportedQueryType` for any type other than `QueryByExample`,
    /// `Validation` if the body does not have the query-by-example shape.
    pub fn from_request(query: &Value) -> StoreResult<Self> {
        if query.is_null() {
            return Err(StoreError::InvalidArgument("query is required".into()));
        }
        match query.get("type") {
            None | Some(Value::Null) => {
                return Err(StoreError::InvalidArgument("query.type is required".into()))
            }
            Some(Value::String(t)) if t == QUERY_BY_EXAMPLE => {}
            Some(other) => {
                let name = other
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string());
                return Err(StoreError::UnsupportedQueryType(name));
            }
        }

        serde_json::from_value(query.clone())
            .map_err(|e| StoreError::Validation(format!("malformed QueryByExample: {}", e)))
    }
}

/// One `(type, issuer?)` equality constraint. `issuer: None` matches any
/// issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub credential_type: String,
    pub issuer: Option<String>,
}

impl Candidate {
    /// Filter scoped to `profile`.
    pub fn to_filter(&self, profile: &ProfileId) -> Filter {
        let filter = Filter::new()
            .eq(attr::META_PROFILE_ID, profile.as_str())
            .eq(attr::CONTENT_TYPE, self.credential_type.as_str());
        match &self.issuer {
            Some(issuer) => filter.eq(attr::META_ISSUER, issuer.as_str()),
            None => filter,
        }
    }
}

/// The candidates compiled from one query item. A document satisfying any
/// candidate satisfies the item.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub candidates: Vec<Candidate>,
}

impl SubQuery {
    pub fn filters(&self, profile: &ProfileId) -> Vec<Filter> {
        self.candidates
            .iter()
            .map(|candidate| candidate.to_filter(profile))
            .collect()
    }
}

/// Sub-queries in request item order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sub_queries: Vec<SubQuery>,
}

impl CompiledQuery {
    pub fn candidate_count(&self) -> usize {
        self.sub_queries.iter().map(|s| s.candidates.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCompiler {
    policy: IssuerPolicy,
}

impl QueryCompiler {
    pub fn new(policy: IssuerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> IssuerPolicy {
        self.policy
    }

    pub fn compile(&self, query: QueryByExample) -> StoreResult<CompiledQuery> {
        let sub_queries = query
            .credential_query
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.compile_item(index, item))
            .collect::<StoreResult<Vec<_>>>()?;

        let compiled = CompiledQuery { sub_queries };
        tracing::debug!(
            items = compiled.sub_queries.len(),
            candidates = compiled.candidate_count(),
            policy = ?self.policy,
            "compiled query by example"
        );
        Ok(compiled)
    }

    fn compile_item(&self, index: usize, item: CredentialQueryItem) -> StoreResult<SubQuery> {
        let types = item.example.types.into_vec();
        if types.is_empty() {
            return Err(StoreError::Validation(format!(
                "credentialQuery[{}].example.type must name at least one type",
                index
            )));
        }
        if types.iter().any(String::is_empty) {
            return Err(StoreError::Validation(format!(
                "credentialQuery[{}].example.type must not contain empty types",
                index
            )));
        }

        let listed = item
            .trusted_issuer
            .map(OneOrMany::into_vec)
            .unwrap_or_default();

        // every listed entry is shape-checked, eligible or not
        let mut issuers = Vec::new();
        for trusted in &listed {
            let id = trusted.issuer_id()?;
            let eligible = match self.policy {
                IssuerPolicy::AnyListed => true,
                IssuerPolicy::RequiredOnly => trusted.required,
            };
            if eligible {
                issuers.push(id.to_string());
            }
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut push = |candidate: Candidate| {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        };
        for credential_type in &types {
            if issuers.is_empty() {
                push(Candidate {
                    credential_type: credential_type.clone(),
                    issuer: None,
                });
            }
            for issuer in &issuers {
                push(Candidate {
                    credential_type: credential_type.clone(),
                    issuer: Some(issuer.clone()),
                });
            }
        }

        Ok(SubQuery { candidates })
    }
}
