//! Settings file loading.
//!
//! The whole scheme table is read once at process start; scheme descriptors
//! are immutable afterwards. Unknown keys are rejected so a typo in the
//! settings file fails loudly instead of silently dropping configuration.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub schemes: SchemeTable,
    pub groceries_api: ApiSettings,
    pub directory: DirectorySettings,
}

/// Directory-service collaborator wiring: the REST base for profile reads and
/// method writes, plus the middleware API used for attribute updates.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySettings {
    /// Directory service REST base, e.g. `https://directory.contoso.example/v1`
    pub service_url: String,
    #[serde(default)]
    pub middleware: ApiSettings,
}

/// One entry per sign-in scheme. The table is closed: exactly three schemes.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemeTable {
    pub default: SchemeSettings,
    pub fraud_protection: SchemeSettings,
    pub email_otp: SchemeSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemeSettings {
    /// Identity provider authority, e.g. `https://login.contoso.example/tenant`
    pub authority: String,
    /// Optional policy appended to the metadata address as `?p=<policy>`
    #[serde(default)]
    pub policy: Option<String>,
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub valid_issuers: Vec<String>,
    pub valid_audiences: Vec<String>,
}

/// Downstream API wiring (groceries API, directory middleware). All fields are
/// optional on purpose: the token exchange facade reports a user-actionable
/// remediation message for each missing piece instead of failing generically.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Settings {
    /// Parse settings from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or contains unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse settings")
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[schemes.default]
authority = "https://login.contoso.example/tenant"
client_id = "web"
client_secret = "s3cret"
redirect_uri = "https://store.contoso.example/auth/callback"
valid_issuers = ["https://login.contoso.example/tenant/v2.0"]
valid_audiences = ["web"]

[schemes.fraud_protection]
authority = "https://login.contoso.example/tenant"
policy = "fraud"
client_id = "web-fraud"
client_secret = "s3cret"
redirect_uri = "https://store.contoso.example/auth/callback"
valid_issuers = ["https://login.contoso.example/tenant/v2.0"]
valid_audiences = ["web-fraud"]

[schemes.email_otp]
authority = "https://login.contoso.example/tenant"
policy = "email-otp"
client_id = "web-otp"
client_secret = "s3cret"
redirect_uri = "https://store.contoso.example/auth/callback"
valid_issuers = ["https://login.contoso.example/tenant/v2.0"]
valid_audiences = ["web-otp"]

[groceries_api]
base_url = "api://groceries"
scopes = ["Account.Payment", "Account.Purchases"]
endpoint = "https://groceries.contoso.example/api/"

[directory]
service_url = "https://directory.contoso.example/v1"

[directory.middleware]
base_url = "api://directory"
scopes = ["Profile.ReadWrite"]
endpoint = "https://directory.contoso.example/api/update"
"#;

    #[test]
    fn parses_sample_settings() -> Result<()> {
        let settings = Settings::from_toml_str(SAMPLE)?;
        assert_eq!(settings.schemes.default.client_id, "web");
        assert_eq!(settings.schemes.fraud_protection.policy.as_deref(), Some("fraud"));
        assert_eq!(
            settings.directory.service_url,
            "https://directory.contoso.example/v1"
        );
        assert_eq!(
            settings.directory.middleware.endpoint.as_deref(),
            Some("https://directory.contoso.example/api/update")
        );
        assert_eq!(
            settings.groceries_api.scopes.as_deref(),
            Some(&["Account.Payment".to_string(), "Account.Purchases".to_string()][..])
        );
        Ok(())
    }

    #[test]
    fn rejects_unknown_keys() {
        let raw = format!("{SAMPLE}\n[unexpected]\nkey = 1\n");
        assert!(Settings::from_toml_str(&raw).is_err());
    }

    #[test]
    fn missing_groceries_fields_parse_as_none() -> Result<()> {
        let raw = SAMPLE.replace(
            "[groceries_api]\nbase_url = \"api://groceries\"\nscopes = [\"Account.Payment\", \"Account.Purchases\"]\nendpoint = \"https://groceries.contoso.example/api/\"",
            "[groceries_api]",
        );
        let settings = Settings::from_toml_str(&raw)?;
        assert!(settings.groceries_api.scopes.is_none());
        assert!(settings.groceries_api.base_url.is_none());
        Ok(())
    }
}
