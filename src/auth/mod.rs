//! Authentication core: scheme table, redirect pipeline, token validation,
//! step-up claims, claims-challenge detection, and token exchange.
//!
//! Three sign-in schemes run concurrently. Each scheme owns its OIDC client
//! configuration and session-cookie namespace; the cookie of one scheme is
//! never read or written by another scheme's handlers. The only shared step
//! is [`router::select`], which picks the scheme for an inbound request.

pub mod challenge;
pub mod claims;
pub mod error;
pub mod metadata;
pub mod properties;
pub mod protocol;
pub mod router;
pub mod tokens;
pub mod validate;

use crate::config::SchemeSettings;
use anyhow::{Context, Result};
use metadata::{IssuerConfig, MetadataResolver};
use std::sync::Arc;

/// Identifier of a sign-in scheme. Exactly three schemes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeId {
    /// Standard OIDC sign-in, the default.
    Default,
    /// Sign-in flow protected by the fraud-detection challenge.
    FraudProtection,
    /// Sign-in flow using email one-time passcodes.
    EmailOtp,
}

impl SchemeId {
    pub const ALL: [SchemeId; 3] = [SchemeId::Default, SchemeId::FraudProtection, SchemeId::EmailOtp];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SchemeId::Default => "OpenIdConnect",
            SchemeId::FraudProtection => "FraudProtection",
            SchemeId::EmailOtp => "EmailOtp",
        }
    }

    /// Session cookie name for this scheme. Names are distinct and
    /// scheme-identifying so the router can dispatch on cookie presence.
    #[must_use]
    pub const fn cookie_name(self) -> &'static str {
        match self {
            SchemeId::Default => "grovemart.OpenIdConnect.session",
            SchemeId::FraudProtection => "grovemart.FraudProtection.session",
            SchemeId::EmailOtp => "grovemart.EmailOtp.session",
        }
    }

    /// Map an explicit `handler` query parameter to a scheme. Only the
    /// non-default schemes can be requested explicitly; anything else is
    /// ignored by the router.
    #[must_use]
    pub fn from_handler(handler: &str) -> Option<Self> {
        match handler {
            "FraudProtection" => Some(SchemeId::FraudProtection),
            "EmailOtp" => Some(SchemeId::EmailOtp),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        SchemeId::ALL.into_iter().find(|id| id.name() == name)
    }
}

/// Immutable descriptor for one sign-in scheme: client configuration plus the
/// issuer metadata resolved at startup.
#[derive(Debug, Clone)]
pub struct Scheme {
    pub id: SchemeId,
    pub settings: SchemeSettings,
    pub issuer: Arc<IssuerConfig>,
}

/// The scheme table, built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct SchemeSet {
    default: Scheme,
    fraud_protection: Scheme,
    email_otp: Scheme,
}

impl SchemeSet {
    /// Resolve issuer metadata for all three schemes and build the table.
    /// Any metadata or JWKS failure is fatal: the process cannot validate
    /// tokens without signing keys.
    ///
    /// # Errors
    /// Returns an error if metadata resolution fails for any scheme.
    pub async fn bootstrap(
        resolver: &MetadataResolver,
        table: &crate::config::SchemeTable,
    ) -> Result<Self> {
        let mut schemes = Vec::with_capacity(SchemeId::ALL.len());

        for (id, settings) in [
            (SchemeId::Default, &table.default),
            (SchemeId::FraudProtection, &table.fraud_protection),
            (SchemeId::EmailOtp, &table.email_otp),
        ] {
            let issuer = resolver
                .resolve(&settings.authority, settings.policy.as_deref())
                .await
                .with_context(|| format!("Failed to resolve issuer metadata for scheme {}", id.name()))?;

            schemes.push(Scheme {
                id,
                settings: settings.clone(),
                issuer,
            });
        }

        let email_otp = schemes.pop().expect("three schemes");
        let fraud_protection = schemes.pop().expect("three schemes");
        let default = schemes.pop().expect("three schemes");

        Ok(Self {
            default,
            fraud_protection,
            email_otp,
        })
    }

    #[must_use]
    pub fn get(&self, id: SchemeId) -> &Scheme {
        match id {
            SchemeId::Default => &self.default,
            SchemeId::FraudProtection => &self.fraud_protection,
            SchemeId::EmailOtp => &self.email_otp,
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::metadata::{IssuerConfig, ProviderMetadata};
    use super::{Scheme, SchemeId};
    use crate::config::SchemeSettings;
    use std::sync::Arc;

    /// Scheme descriptor with an empty JWKS, for tests that never reach the
    /// network.
    pub fn scheme(id: SchemeId) -> Scheme {
        let jwks = serde_json::from_str(r#"{"keys":[]}"#).expect("jwks");
        Scheme {
            id,
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
                    authorization_endpoint: "https://login.contoso.example/tenant/oauth2/v2.0/authorize"
                        .to_string(),
                    token_endpoint: "https://login.contoso.example/tenant/oauth2/v2.0/token"
                        .to_string(),
                    userinfo_endpoint: None,
                    end_session_endpoint: None,
                    jwks_uri: "https://login.contoso.example/tenant/discovery/v2.0/keys".to_string(),
                },
                jwks,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_names_are_distinct() {
        let names: Vec<_> = SchemeId::ALL.iter().map(|id| id.name()).collect();
        let cookies: Vec<_> = SchemeId::ALL.iter().map(|id| id.cookie_name()).collect();
        for (i, name) in names.iter().enumerate() {
            for other in &names[i + 1..] {
                assert_ne!(name, other);
            }
        }
        for (i, cookie) in cookies.iter().enumerate() {
            for other in &cookies[i + 1..] {
                assert_ne!(cookie, other);
            }
        }
    }

    #[test]
    fn handler_only_maps_non_default_schemes() {
        assert_eq!(
            SchemeId::from_handler("FraudProtection"),
            Some(SchemeId::FraudProtection)
        );
        assert_eq!(SchemeId::from_handler("EmailOtp"), Some(SchemeId::EmailOtp));
        assert_eq!(SchemeId::from_handler("OpenIdConnect"), None);
        assert_eq!(SchemeId::from_handler("unknown"), None);
    }

    #[test]
    fn name_round_trips() {
        for id in SchemeId::ALL {
            assert_eq!(SchemeId::from_name(id.name()), Some(id));
        }
        assert_eq!(SchemeId::from_name("nope"), None);
    }
}
