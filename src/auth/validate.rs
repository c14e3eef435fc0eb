//! Bearer/ID token validation against the resolved issuer configuration.

use super::claims::Principal;
use super::Scheme;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("token header is missing a key id")]
    MissingKeyId,
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),
    #[error("unsupported signing key for key id: {0}")]
    UnsupportedKey(String),
    #[error("nonce mismatch")]
    NonceMismatch,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Validate an ID token issued for `scheme`: RS256 signature against the
/// scheme's JWKS, issuer, audience, and lifetime. Returns the claims as a
/// [`Principal`]; the `AuthScheme` claim is attached by the caller via
/// [`super::claims::augment`] once validation succeeds.
///
/// # Errors
/// Returns [`ValidationError`] if any check fails. Validation failures are
/// fatal to the request; there is no fallback.
pub fn validate(scheme: &Scheme, token: &str, nonce: Option<&str>) -> Result<Principal, ValidationError> {
    let header = decode_header(token)?;
    let kid = header.kid.ok_or(ValidationError::MissingKeyId)?;

    let jwk = scheme
        .issuer
        .jwks
        .find(&kid)
        .ok_or_else(|| ValidationError::UnknownKeyId(kid.clone()))?;

    let key = DecodingKey::from_jwk(jwk).map_err(|_| ValidationError::UnsupportedKey(kid))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&scheme.settings.valid_issuers);
    validation.set_audience(&scheme.settings.valid_audiences);

    let data = decode::<Map<String, Value>>(token, &key, &validation)?;

    // The nonce binds the token to the sign-in redirect that requested it.
    if let Some(expected) = nonce {
        let found = data.claims.get("nonce").and_then(Value::as_str);
        if found != Some(expected) {
            return Err(ValidationError::NonceMismatch);
        }
    }

    Ok(Principal::from_claims(&data.claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::metadata::{IssuerConfig, ProviderMetadata};
    use crate::auth::SchemeId;
    use crate::config::SchemeSettings;
    use jsonwebtoken::jwk::JwkSet;
    use std::sync::Arc;

    fn scheme_with_empty_jwks() -> Scheme {
        let jwks: JwkSet = serde_json::from_str(r#"{"keys":[]}"#).expect("jwks");
        Scheme {
            id: SchemeId::Default,
            settings: SchemeSettings {
                authority: "https://login.contoso.example/tenant".to_string(),
                policy: None,
                client_id: "web".to_string(),
                client_secret: "secret".to_string().into(),
                redirect_uri: "https://store.contoso.example/auth/callback".to_string(),
                valid_issuers: vec!["https://login.contoso.example/tenant/v2.0".to_string()],
                valid_audiences: vec!["web".to_string()],
            },
            issuer: Arc::new(IssuerConfig {
                metadata: ProviderMetadata {
                    issuer: "https://login.contoso.example/tenant/v2.0".to_string(),
                    authorization_endpoint: "https://login.contoso.example/authorize".to_string(),
                    token_endpoint: "https://login.contoso.example/token".to_string(),
                    userinfo_endpoint: None,
                    end_session_endpoint: None,
                    jwks_uri: "https://login.contoso.example/jwks".to_string(),
                },
                jwks,
            }),
        }
    }

    #[test]
    fn garbage_token_is_rejected() {
        let scheme = scheme_with_empty_jwks();
        assert!(validate(&scheme, "not-a-token", None).is_err());
    }

    #[test]
    fn token_without_kid_is_rejected() {
        let scheme = scheme_with_empty_jwks();
        // Header {"alg":"RS256"} with empty payload/signature parts.
        let token = "eyJhbGciOiJSUzI1NiJ9.e30.c2ln";
        let result = validate(&scheme, token, None);
        assert!(matches!(result, Err(ValidationError::MissingKeyId)));
    }

    #[test]
    fn unknown_kid_is_rejected() {
        let scheme = scheme_with_empty_jwks();
        // Header {"alg":"RS256","kid":"nope"}.
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Im5vcGUifQ.e30.c2ln";
        let result = validate(&scheme, token, None);
        match result {
            Err(ValidationError::UnknownKeyId(kid)) => assert_eq!(kid, "nope"),
            other => panic!("expected UnknownKeyId, got {other:?}"),
        }
    }
}
