//! Directory service collaborator.
//!
//! Thin HTTP wrapper around the directory's user-profile REST surface. The
//! auth core only needs profile attribute read/write plus the two verified
//! email writes (sign-in email and email MFA method). Errors preserve the
//! downstream error body so callers can run claims-challenge detection on it.

use crate::auth::challenge::{DownstreamApiError, DownstreamErrorBody};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory returned an error body; may carry a claims challenge.
    #[error("{}", .0.message)]
    Api(DownstreamApiError),
    #[error("directory request failed: {0}")]
    Network(String),
}

impl DirectoryError {
    #[must_use]
    pub fn api_error(&self) -> Option<&DownstreamApiError> {
        match self {
            DirectoryError::Api(error) => Some(error),
            DirectoryError::Network(_) => None,
        }
    }
}

/// User profile attributes as surfaced to the storefront.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserAttributes {
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub account_enabled: bool,
    #[serde(default)]
    pub special_diet: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_password_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Attribute update submitted from the profile form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAttributes {
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub special_diet: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: Client,
    base_url: String,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(http: Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Read a user's profile attributes.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Api`] with the downstream error body (which
    /// the caller feeds through claims-challenge detection) or
    /// [`DirectoryError::Network`] for transport failures.
    #[instrument(skip(self, authorization))]
    pub async fn get_profile(
        &self,
        authorization: &str,
        object_id: &str,
    ) -> Result<UserAttributes, DirectoryError> {
        let url = format!("{}/users/{object_id}", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|err| DirectoryError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let body: DownstreamErrorBody = response.json().await.unwrap_or_default();
            return Err(DirectoryError::Api(body.error));
        }

        response
            .json()
            .await
            .map_err(|err| DirectoryError::Network(err.to_string()))
    }

    /// Replace the user's sign-in email after a verified one-time code.
    ///
    /// # Errors
    /// Same classification as [`Self::get_profile`].
    #[instrument(skip(self, authorization))]
    pub async fn update_sign_in_email(
        &self,
        authorization: &str,
        object_id: &str,
        email: &str,
    ) -> Result<(), DirectoryError> {
        let url = format!("{}/users/{object_id}/sign-in-email", self.base_url);
        self.patch(&url, authorization, json!({ "email": email })).await
    }

    /// Update profile attributes through the middleware API with a
    /// user-scoped token. The endpoint comes from the middleware settings,
    /// not from the directory base URL.
    ///
    /// # Errors
    /// Same classification as [`Self::get_profile`].
    #[instrument(skip(self, authorization, update))]
    pub async fn update_profile(
        &self,
        endpoint: &str,
        authorization: &str,
        update: &UpdateAttributes,
    ) -> Result<UserAttributes, DirectoryError> {
        let response = self
            .http
            .post(endpoint)
            .header("Authorization", authorization)
            .json(update)
            .send()
            .await
            .map_err(|err| DirectoryError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let body: DownstreamErrorBody = response.json().await.unwrap_or_default();
            return Err(DirectoryError::Api(body.error));
        }

        response
            .json()
            .await
            .map_err(|err| DirectoryError::Network(err.to_string()))
    }

    /// Replace (or create) the user's email MFA method.
    ///
    /// # Errors
    /// Same classification as [`Self::get_profile`].
    #[instrument(skip(self, authorization))]
    pub async fn update_email_mfa_method(
        &self,
        authorization: &str,
        object_id: &str,
        email: &str,
    ) -> Result<(), DirectoryError> {
        let url = format!(
            "{}/users/{object_id}/authentication/email-methods",
            self.base_url
        );
        self.patch(&url, authorization, json!({ "email": email })).await
    }

    async fn patch(
        &self,
        url: &str,
        authorization: &str,
        body: serde_json::Value,
    ) -> Result<(), DirectoryError> {
        let response = self
            .http
            .patch(url)
            .header("Authorization", authorization)
            .json(&body)
            .send()
            .await
            .map_err(|err| DirectoryError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let body: DownstreamErrorBody = response.json().await.unwrap_or_default();
            return Err(DirectoryError::Api(body.error));
        }

        Ok(())
    }
}
