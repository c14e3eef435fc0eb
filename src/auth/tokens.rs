//! Token exchange facade.
//!
//! Obtains bearer tokens scoped to a downstream API on behalf of the
//! signed-in user. Tokens live for the duration of one outbound call and are
//! never persisted; the only state is the per-user grant mirrored into the
//! broker's cache at sign-in. Errors are never silently retried: the caller
//! must re-prompt the user interactively.

use super::claims::Principal;
use super::Scheme;
use crate::config::ApiSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum AcquireError {
    /// Missing or invalid application settings. User-actionable, never retried.
    #[error("{0}")]
    Configuration(String),
    /// The token cache has no grant for this user.
    #[error("The token cache does not contain the token to access the web APIs. To get the access token, sign-out and sign-in again.")]
    NoCachedIdentity,
    /// The provider demands interactive sign-in for other reasons.
    #[error("{0}")]
    InteractionRequired(String),
    /// The token endpoint call itself failed.
    #[error("Token endpoint request failed: {0}")]
    Network(String),
}

/// Fully-qualified scopes and endpoint for one downstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedApi {
    pub scopes: Vec<String>,
    pub endpoint: String,
}

/// Resolve a downstream API's settings, qualifying each scope as
/// `{base_url}/{scope}`. Each missing piece gets its own remediation message;
/// nothing is fetched over the network here.
///
/// # Errors
/// Returns [`AcquireError::Configuration`] naming the missing setting.
pub fn resolve_downstream(settings: &ApiSettings, section: &str) -> Result<ResolvedApi, AcquireError> {
    let scopes = settings.scopes.as_ref().ok_or_else(|| {
        AcquireError::Configuration(format!(
            "The {section} Scopes application setting is misconfigured or missing. \
             Use the array format: [\"Account.Payment\", \"Account.Purchases\"]"
        ))
    })?;

    let base_url = settings
        .base_url
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AcquireError::Configuration(format!(
                "The {section} BaseUrl application setting is misconfigured or missing. \
                 Check out your application's scope base URL in the identity provider \
                 admin center. For example: api://12345678-0000-0000-0000-000000000000"
            ))
        })?;

    let endpoint = settings
        .endpoint
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AcquireError::Configuration(format!(
                "The {section} Endpoint application setting is misconfigured or missing."
            ))
        })?;

    Ok(ResolvedApi {
        scopes: scopes
            .iter()
            .map(|scope| format!("{base_url}/{scope}"))
            .collect(),
        endpoint: endpoint.to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

// Provider error codes that mean the cached grant cannot silently produce a
// token and the user must sign in interactively.
const INTERACTION_ERRORS: [&str; 4] = [
    "interaction_required",
    "consent_required",
    "login_required",
    "invalid_grant",
];

/// Per-user token store plus the token-endpoint client.
#[derive(Debug)]
pub struct TokenBroker {
    http: Client,
    cache: RwLock<HashMap<String, SecretString>>,
}

impl TokenBroker {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self {
            http,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Mirror the sign-in grant into the token store, keyed by the user's
    /// object id.
    pub async fn store(&self, object_id: &str, refresh_token: SecretString) {
        self.cache
            .write()
            .await
            .insert(object_id.to_string(), refresh_token);
    }

    /// Drop the user's grant (sign-out).
    pub async fn clear(&self, object_id: &str) {
        self.cache.write().await.remove(object_id);
    }

    /// Redeem an authorization code at the scheme's token endpoint.
    ///
    /// # Errors
    /// Returns [`AcquireError`] classified from the provider response.
    #[instrument(skip(self, code))]
    pub async fn redeem_code(&self, scheme: &Scheme, code: &str) -> Result<TokenResponse, AcquireError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &scheme.settings.client_id),
            ("client_secret", scheme.settings.client_secret.expose_secret()),
            ("redirect_uri", &scheme.settings.redirect_uri),
            ("scope", "openid profile email offline_access"),
        ];

        self.post_token(&scheme.issuer.metadata.token_endpoint, &form)
            .await
    }

    /// Obtain a bearer authorization header scoped to a downstream API on
    /// behalf of the signed-in user, from the cached grant.
    ///
    /// # Errors
    /// [`AcquireError::NoCachedIdentity`] when the token store has no grant
    /// for the user, [`AcquireError::InteractionRequired`] when the provider
    /// demands interactive sign-in, [`AcquireError::Network`] otherwise.
    #[instrument(skip(self, principal))]
    pub async fn acquire(
        &self,
        scheme: &Scheme,
        principal: &Principal,
        scopes: &[String],
    ) -> Result<String, AcquireError> {
        let object_id = principal.object_id().ok_or(AcquireError::NoCachedIdentity)?;

        let refresh_token = self
            .cache
            .read()
            .await
            .get(object_id)
            .cloned()
            .ok_or(AcquireError::NoCachedIdentity)?;

        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", &scheme.settings.client_id),
            ("client_secret", scheme.settings.client_secret.expose_secret()),
            ("scope", &scope),
        ];

        let response = self
            .post_token(&scheme.issuer.metadata.token_endpoint, &form)
            .await?;

        // The provider may rotate the grant; keep the newest one.
        if let Some(rotated) = response.refresh_token {
            self.store(object_id, rotated.into()).await;
        }

        let access_token = response.access_token.ok_or_else(|| {
            AcquireError::Network("Token endpoint returned no access token".to_string())
        })?;

        debug!(scopes = %scope, "Acquired downstream access token");

        Ok(format!("Bearer {access_token}"))
    }

    /// App-only bearer authorization header for a collaborator API
    /// (client-credentials grant).
    ///
    /// # Errors
    /// Returns [`AcquireError`] classified from the provider response.
    #[instrument(skip(self))]
    pub async fn acquire_app(&self, scheme: &Scheme, scope: &str) -> Result<String, AcquireError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", &scheme.settings.client_id),
            ("client_secret", scheme.settings.client_secret.expose_secret()),
            ("scope", scope),
        ];

        let response = self
            .post_token(&scheme.issuer.metadata.token_endpoint, &form)
            .await?;

        let access_token = response.access_token.ok_or_else(|| {
            AcquireError::Network("Token endpoint returned no access token".to_string())
        })?;

        Ok(format!("Bearer {access_token}"))
    }

    async fn post_token(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AcquireError> {
        let response = self
            .http
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|err| AcquireError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: TokenErrorBody = response.json().await.unwrap_or_default();

            if INTERACTION_ERRORS.contains(&body.error.as_str()) {
                let description = if body.error_description.is_empty() {
                    body.error
                } else {
                    body.error_description
                };
                return Err(AcquireError::InteractionRequired(description));
            }

            return Err(AcquireError::Network(format!(
                "{status}, {}",
                if body.error.is_empty() { "unknown error".to_string() } else { body.error }
            )));
        }

        response
            .json()
            .await
            .map_err(|err| AcquireError::Network(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil;
    use serde_json::json;

    #[test]
    fn missing_scopes_is_a_configuration_error() {
        let settings = ApiSettings {
            base_url: Some("api://groceries".to_string()),
            scopes: None,
            endpoint: Some("https://groceries.contoso.example/api/".to_string()),
        };

        let err = resolve_downstream(&settings, "groceries_api").unwrap_err();
        match err {
            AcquireError::Configuration(message) => assert!(message.contains("Scopes")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn missing_base_url_is_a_configuration_error() {
        let settings = ApiSettings {
            base_url: None,
            scopes: Some(vec!["Account.Payment".to_string()]),
            endpoint: Some("https://groceries.contoso.example/api/".to_string()),
        };

        let err = resolve_downstream(&settings, "groceries_api").unwrap_err();
        match err {
            AcquireError::Configuration(message) => assert!(message.contains("BaseUrl")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn missing_endpoint_is_a_configuration_error() {
        let settings = ApiSettings {
            base_url: Some("api://groceries".to_string()),
            scopes: Some(vec!["Account.Payment".to_string()]),
            endpoint: None,
        };

        let err = resolve_downstream(&settings, "groceries_api").unwrap_err();
        match err {
            AcquireError::Configuration(message) => assert!(message.contains("Endpoint")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn scopes_are_fully_qualified() {
        let settings = ApiSettings {
            base_url: Some("api://groceries".to_string()),
            scopes: Some(vec![
                "Account.Payment".to_string(),
                "Account.Purchases".to_string(),
            ]),
            endpoint: Some("https://groceries.contoso.example/api/".to_string()),
        };

        let resolved = resolve_downstream(&settings, "groceries_api").expect("resolved");
        assert_eq!(
            resolved.scopes,
            vec![
                "api://groceries/Account.Payment".to_string(),
                "api://groceries/Account.Purchases".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn acquire_without_cached_grant_fails_before_any_network_call() {
        let broker = TokenBroker::new(Client::new());
        let scheme = testutil::scheme(crate::auth::SchemeId::Default);
        let principal = Principal::from_claims(
            json!({ "oid": "user-1" }).as_object().expect("claims"),
        );

        let err = broker
            .acquire(&scheme, &principal, &["api://x/scope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NoCachedIdentity));
    }

    #[tokio::test]
    async fn acquire_without_object_id_reports_no_cached_identity() {
        let broker = TokenBroker::new(Client::new());
        let scheme = testutil::scheme(crate::auth::SchemeId::Default);
        let principal = Principal::default();

        let err = broker
            .acquire(&scheme, &principal, &["api://x/scope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NoCachedIdentity));
    }

    #[tokio::test]
    async fn cleared_grant_is_gone() {
        let broker = TokenBroker::new(Client::new());
        broker.store("user-1", "grant".to_string().into()).await;
        broker.clear("user-1").await;

        let scheme = testutil::scheme(crate::auth::SchemeId::Default);
        let principal = Principal::from_claims(
            json!({ "oid": "user-1" }).as_object().expect("claims"),
        );

        let err = broker
            .acquire(&scheme, &principal, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::NoCachedIdentity));
    }
}
