//! Sign-in redirect properties.
//!
//! A closed structure instead of a free-form string map: the eight recognized
//! keys become named optional fields and anything else is rejected. The
//! properties live for a single redirect round-trip and are never persisted.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sign-in property: {0}")]
pub struct UnknownProperty(pub String);

/// Per-redirect sign-in options. Each field maps to a distinct protocol
/// transformation in [`super::protocol::customize`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectProperties {
    /// Force re-authentication (`prompt=login`).
    pub force: Option<String>,
    /// Request the `acrs=c1` step-up authentication context.
    pub step_up: Option<String>,
    /// Rewrite the host of the identity-provider authorization URL.
    pub domain: Option<String>,
    /// Set the prompt parameter directly. Applied after `force`, so it wins
    /// when both are present.
    pub prompt: Option<String>,
    /// UI locale, mirrored into both `ui_locales` and the vendor `mkt` field.
    pub ui_locales: Option<String>,
    pub login_hint: Option<String>,
    pub domain_hint: Option<String>,
    /// Raw `k=v&k=v` string appended as extra protocol parameters.
    pub query_string: Option<String>,
}

impl RedirectProperties {
    /// Build properties from key/value pairs, rejecting unknown keys.
    ///
    /// # Errors
    /// Returns [`UnknownProperty`] for any key outside the recognized set.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, UnknownProperty>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut properties = Self::default();

        for (key, value) in pairs {
            let slot = match key {
                "force" => &mut properties.force,
                "StepUp" => &mut properties.step_up,
                "domain" => &mut properties.domain,
                "prompt" => &mut properties.prompt,
                "ui_locales" => &mut properties.ui_locales,
                "login_hint" => &mut properties.login_hint,
                "domain_hint" => &mut properties.domain_hint,
                "query-string" => &mut properties.query_string,
                other => return Err(UnknownProperty(other.to_string())),
            };
            *slot = Some(value.to_string());
        }

        Ok(properties)
    }
}
