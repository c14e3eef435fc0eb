//! Claims, principals, and the post-authentication claims augmenter.

use super::SchemeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Synthetic claim recording which scheme authenticated the session.
pub const AUTH_SCHEME_CLAIM: &str = "AuthScheme";
/// Authentication-context-reference claim asserted by the identity provider.
pub const ACR_CLAIM: &str = "acrs";
/// Authentication context value meaning the step-up challenge was satisfied.
pub const STEP_UP_ACR: &str = "c1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
}

/// The set of claims bound to an authenticated user after token validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    claims: Vec<Claim>,
}

impl Principal {
    /// Flatten validated token claims into name/value pairs. Array-valued
    /// claims (groups, acrs) become one entry per element.
    #[must_use]
    pub fn from_claims(claims: &Map<String, Value>) -> Self {
        let mut principal = Self::default();

        for (name, value) in claims {
            match value {
                Value::String(s) => principal.add(name, s),
                Value::Array(items) => {
                    for item in items {
                        if let Value::String(s) = item {
                            principal.add(name, s);
                        }
                    }
                }
                Value::Number(n) => principal.add(name, n.to_string()),
                Value::Bool(b) => principal.add(name, b.to_string()),
                _ => {}
            }
        }

        principal
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.claims.push(Claim {
            name: name.into(),
            value: value.into(),
        });
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.name == name)
            .map(|claim| claim.value.as_str())
    }

    #[must_use]
    pub fn has(&self, name: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|claim| claim.name == name && claim.value == value)
    }

    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Whether the identity provider asserted the step-up authentication
    /// context. Computed on demand, never cached: a session may be elevated
    /// mid-lifetime by re-authentication.
    #[must_use]
    pub fn step_up_satisfied(&self) -> bool {
        self.has(ACR_CLAIM, STEP_UP_ACR)
    }

    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.get("oid")
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.get("name")
    }

    #[must_use]
    pub fn auth_scheme(&self) -> Option<SchemeId> {
        self.get(AUTH_SCHEME_CLAIM).and_then(SchemeId::from_name)
    }
}

/// Attach the `AuthScheme` claim to a freshly validated principal.
///
/// Runs exactly once per token validation, after signature/issuer/audience/
/// lifetime checks succeed and before the principal reaches authorization
/// decisions: downstream authorization and API routing branch on this claim.
pub fn augment(principal: &mut Principal, scheme: SchemeId) {
    principal.add(AUTH_SCHEME_CLAIM, scheme.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn flattens_scalar_and_array_claims() {
        let principal = Principal::from_claims(&claims(json!({
            "oid": "user-1",
            "name": "Alice",
            "groups": ["a", "b"],
            "auth_time": 1700000000,
        })));

        assert_eq!(principal.object_id(), Some("user-1"));
        assert_eq!(principal.display_name(), Some("Alice"));
        assert!(principal.has("groups", "a"));
        assert!(principal.has("groups", "b"));
        assert_eq!(principal.get("auth_time"), Some("1700000000"));
    }

    #[test]
    fn step_up_requires_acrs_c1() {
        let without = Principal::from_claims(&claims(json!({ "oid": "user-1" })));
        assert!(!without.step_up_satisfied());

        let wrong_value = Principal::from_claims(&claims(json!({ "acrs": "c2" })));
        assert!(!wrong_value.step_up_satisfied());

        let satisfied = Principal::from_claims(&claims(json!({ "acrs": ["c1"] })));
        assert!(satisfied.step_up_satisfied());
    }

    #[test]
    fn augment_records_the_scheme() {
        let mut principal = Principal::default();
        augment(&mut principal, SchemeId::EmailOtp);

        assert_eq!(principal.get(AUTH_SCHEME_CLAIM), Some("EmailOtp"));
        assert_eq!(principal.auth_scheme(), Some(SchemeId::EmailOtp));
    }
}
