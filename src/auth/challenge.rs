//! Claims-challenge detection for downstream API errors.
//!
//! A directory or downstream call can fail because the identity provider
//! demands additional claims (step-up, incremental consent). The error then
//! carries an opaque claims blob which must be round-tripped verbatim into a
//! new sign-in redirect; it is never parsed here.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use url::form_urlencoded;

/// Error shape returned by downstream collaborators: a message plus optional
/// additional data entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownstreamApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(flatten, default)]
    pub additional_data: HashMap<String, Value>,
}

/// Wrapper matching the `{"error": {...}}` body convention.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownstreamErrorBody {
    #[serde(default)]
    pub error: DownstreamApiError,
}

/// A detected step-up requirement. The claims value is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsChallenge {
    pub claims: String,
}

impl ClaimsChallenge {
    /// Sign-in redirect carrying the challenge, targeting the default scheme
    /// with a return URL back to the originating page.
    #[must_use]
    pub fn redirect_location(&self, return_url: &str) -> String {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("claims", &self.claims)
            .append_pair("return_url", return_url)
            .finish();
        format!("/auth/signin?{query}")
    }
}

/// Detect an embedded step-up requirement in a downstream error.
///
/// A challenge is returned only if the message contains the case-insensitive
/// substring "claims" AND the additional data carries a string-valued `claims`
/// entry. Any other error shape yields `None` and the caller surfaces a
/// user-visible message instead.
#[must_use]
pub fn detect(error: &DownstreamApiError) -> Option<ClaimsChallenge> {
    if !error.message.to_lowercase().contains("claims") {
        return None;
    }

    let claims = error.additional_data.get("claims")?.as_str()?;

    Some(ClaimsChallenge {
        claims: claims.to_string(),
    })
}
