//! Token issuer configuration resolver.
//!
//! Fetches the OIDC discovery document and JWKS for a given (authority,
//! policy) pair over HTTPS only and caches the result per key. Each scheme
//! resolves its configuration once at startup; entries are never invalidated.
//! Concurrent first-time resolutions for the same key may fetch twice; the
//! redundant fetch is tolerated instead of serializing startup.

use anyhow::{bail, Context, Result};
use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use url::Url;

/// Signing keys, issuer string, and endpoint URLs published by the identity
/// provider for one (authority, policy) pair.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    pub jwks_uri: String,
}

#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub metadata: ProviderMetadata,
    pub jwks: JwkSet,
}

#[derive(Debug)]
pub struct MetadataResolver {
    client: Client,
    cache: RwLock<HashMap<(String, String), Arc<IssuerConfig>>>,
}

impl MetadataResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve issuer configuration for an authority/policy pair, hitting the
    /// cache first.
    ///
    /// # Errors
    /// Returns an error if the metadata address is not HTTPS, the fetch fails,
    /// or the documents do not parse. Callers treat this as fatal at startup.
    #[instrument(skip(self))]
    pub async fn resolve(&self, authority: &str, policy: Option<&str>) -> Result<Arc<IssuerConfig>> {
        let key = (
            authority.to_string(),
            policy.unwrap_or_default().to_string(),
        );

        if let Some(found) = self.cache.read().await.get(&key) {
            return Ok(found.clone());
        }

        let config = Arc::new(self.fetch(authority, policy).await?);

        // A racing resolver may have inserted first; keep whichever won.
        let cached = self
            .cache
            .write()
            .await
            .entry(key)
            .or_insert(config)
            .clone();

        Ok(cached)
    }

    async fn fetch(&self, authority: &str, policy: Option<&str>) -> Result<IssuerConfig> {
        let metadata_url = metadata_address(authority, policy)?;
        require_https(&metadata_url)?;

        let metadata: ProviderMetadata = self
            .client
            .get(metadata_url.as_str())
            .send()
            .await
            .with_context(|| format!("Failed to fetch issuer metadata from {metadata_url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse issuer metadata")?;

        let jwks_url = Url::parse(&metadata.jwks_uri).context("Invalid jwks_uri in metadata")?;
        require_https(&jwks_url)?;

        let jwks: JwkSet = self
            .client
            .get(jwks_url.as_str())
            .send()
            .await
            .with_context(|| format!("Failed to fetch JWKS from {jwks_url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse JWKS")?;

        info!(issuer = %metadata.issuer, keys = jwks.keys.len(), "Resolved issuer configuration");

        Ok(IssuerConfig { metadata, jwks })
    }
}

/// Discovery document address for an authority and optional policy.
///
/// # Errors
/// Returns an error if the authority is not a valid URL base.
pub fn metadata_address(authority: &str, policy: Option<&str>) -> Result<Url> {
    let base = format!(
        "{}/v2.0/.well-known/openid-configuration",
        authority.trim_end_matches('/')
    );
    let mut url = Url::parse(&base).with_context(|| format!("Invalid authority: {authority}"))?;

    if let Some(policy) = policy {
        url.query_pairs_mut().append_pair("p", policy);
    }

    Ok(url)
}

// Plaintext metadata sources fail closed.
fn require_https(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        bail!("Refusing to fetch issuer metadata over {}: {url}", url.scheme());
    }
    Ok(())
}
