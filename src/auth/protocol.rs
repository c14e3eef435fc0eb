//! Authorization-request shaping for the redirect to the identity provider.
//!
//! [`customize`] is the pipeline stage invoked right before the redirect is
//! issued: it applies the per-request [`RedirectProperties`] to the protocol
//! message. It is synchronous request-shaping only and never performs network
//! calls.

use super::properties::RedirectProperties;
use super::Scheme;
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use url::Url;

/// URL-encoded JSON requesting the `acrs=c1` authentication context as an
/// essential claim: `{"access_token":{"acrs":{"essential":true,"value":"c1"}}}`
pub const STEP_UP_CLAIMS_PARAMETER: &str =
    "%7B%22access_token%22%3A%7B%22acrs%22%3A%7B%22essential%22%3Atrue%2C%22value%22%3A%22c1%22%7D%7D%7D";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid issuer address: {0}")]
    InvalidIssuerAddress(#[from] url::ParseError),
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
}

/// Mutable protocol message for one authorization redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization endpoint the user is redirected to.
    pub issuer_address: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub nonce: String,
    pub prompt: Option<String>,
    pub ui_locales: Option<String>,
    pub login_hint: Option<String>,
    pub domain_hint: Option<String>,
    /// Extra protocol parameters appended verbatim to the final URL. Values
    /// are expected to be URL-encoded already (the step-up claims blob is
    /// round-tripped as-is).
    pub parameters: Vec<(String, String)>,
}

impl AuthorizationRequest {
    #[must_use]
    pub fn new(scheme: &Scheme, state: String, nonce: String) -> Self {
        Self {
            issuer_address: scheme.issuer.metadata.authorization_endpoint.clone(),
            client_id: scheme.settings.client_id.clone(),
            redirect_uri: scheme.settings.redirect_uri.clone(),
            scope: "openid profile email offline_access".to_string(),
            state,
            nonce,
            prompt: None,
            ui_locales: None,
            login_hint: None,
            domain_hint: None,
            parameters: Vec::new(),
        }
    }

    pub fn add_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.push((key.into(), value.into()));
    }

    /// Render the final authorization URL.
    ///
    /// # Errors
    /// Returns an error if the issuer address is not a valid URL.
    pub fn authorize_url(&self) -> Result<String, ProtocolError> {
        let mut url = Url::parse(&self.issuer_address)?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("response_type", "code")
                .append_pair("response_mode", "query")
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("scope", &self.scope)
                .append_pair("state", &self.state)
                .append_pair("nonce", &self.nonce);

            for (field, value) in [
                ("prompt", &self.prompt),
                ("ui_locales", &self.ui_locales),
                ("login_hint", &self.login_hint),
                ("domain_hint", &self.domain_hint),
            ] {
                if let Some(value) = value {
                    query.append_pair(field, value);
                }
            }
        }

        let mut rendered = url.to_string();
        for (key, value) in &self.parameters {
            rendered.push('&');
            rendered.push_str(key);
            rendered.push('=');
            rendered.push_str(value);
        }

        Ok(rendered)
    }
}

/// Apply the per-request sign-in properties to the protocol message.
///
/// The keys are independent; each maps to a distinct protocol field. `prompt`
/// is applied after `force`, so an explicit prompt wins when both are present
/// (observed behavior, kept and tested).
///
/// # Errors
/// Returns an error if the `domain` rewrite produces an invalid URL.
pub fn customize(
    mut message: AuthorizationRequest,
    properties: &RedirectProperties,
) -> Result<AuthorizationRequest, ProtocolError> {
    if properties.force.is_some() {
        message.prompt = Some("login".to_string());
    }

    if properties.step_up.is_some() {
        message.add_parameter("claims", STEP_UP_CLAIMS_PARAMETER);
    }

    if let Some(domain) = &properties.domain {
        let mut url = Url::parse(&message.issuer_address)?;
        url.set_host(Some(domain))
            .map_err(|_| ProtocolError::InvalidDomain(domain.clone()))?;
        message.issuer_address = url.to_string();
    }

    if let Some(prompt) = &properties.prompt {
        message.prompt = Some(prompt.clone());
    }

    if let Some(ui_locales) = &properties.ui_locales {
        message.add_parameter("mkt", ui_locales.clone());
        message.ui_locales = Some(ui_locales.clone());
    }

    if let Some(login_hint) = &properties.login_hint {
        message.login_hint = Some(login_hint.clone());
    }

    if let Some(domain_hint) = &properties.domain_hint {
        message.domain_hint = Some(domain_hint.clone());
    }

    if let Some(query_string) = &properties.query_string {
        for pair in query_string.split('&') {
            let parts: Vec<&str> = pair.split('=').collect();
            // Malformed pairs (not exactly two parts) are silently dropped.
            if parts.len() == 2 {
                message.add_parameter(parts[0], parts[1]);
            }
        }
    }

    Ok(message)
}

/// Random URL-safe token for `state` and `nonce` values.
#[must_use]
pub fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
