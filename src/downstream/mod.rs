//! Downstream grocery-ordering API client.
//!
//! Forwards HTTP requests with the acquired bearer token attached. The
//! account endpoint itself performs an on-behalf-of exchange to call the
//! payment API and returns the resulting token so both can be compared; this
//! service treats all of that as the downstream API's own business.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum GroceriesError {
    #[error("groceries API request failed: {0}")]
    Network(String),
    #[error("groceries API returned {0}: {1}")]
    Status(u16, String),
}

/// Account data returned by the groceries account endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub payment: Option<PaymentData>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PaymentData {
    /// Token the account API obtained for the payment API via on-behalf-of.
    #[serde(
        default,
        rename = "accessTokenToCallThePaymentAPI",
        alias = "AccessTokenToCallThePaymentAPI"
    )]
    pub access_token_to_call_the_payment_api: Option<String>,
}

/// Kind of authentication factor verified by the downstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub enum AuthMethodKind {
    #[serde(rename = "signInEmail", alias = "SignInEmail")]
    SignInEmail,
    #[serde(rename = "emailMfa", alias = "EmailMfa")]
    EmailMfa,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    #[serde(default, alias = "ValidationPassed")]
    pub validation_passed: bool,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
    #[serde(default, alias = "AuthType")]
    pub auth_type: Option<AuthMethodKind>,
    #[serde(default, alias = "AuthValue")]
    pub auth_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroceriesClient {
    http: Client,
}

impl GroceriesClient {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Call the account endpoint with the user's bearer token.
    ///
    /// # Errors
    /// Returns [`GroceriesError`] for transport failures or non-success
    /// statuses; the message is surfaced to the caller, not retried.
    #[instrument(skip(self, authorization))]
    pub async fn get_account(
        &self,
        endpoint: &str,
        authorization: &str,
    ) -> Result<AccountData, GroceriesError> {
        let response = self
            .http
            .get(endpoint)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|err| GroceriesError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GroceriesError::Status(status, body));
        }

        response
            .json()
            .await
            .map_err(|err| GroceriesError::Network(err.to_string()))
    }

    /// Relay a one-time-code verification to the downstream endpoint.
    ///
    /// # Errors
    /// Same classification as [`Self::get_account`].
    #[instrument(skip(self, authorization, request))]
    pub async fn post_verify_code(
        &self,
        endpoint: &str,
        authorization: &str,
        request: &VerifyCodeRequest,
    ) -> Result<VerifyCodeResponse, GroceriesError> {
        let response = self
            .http
            .post(endpoint)
            .header("Authorization", authorization)
            .json(request)
            .send()
            .await
            .map_err(|err| GroceriesError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GroceriesError::Status(status, body));
        }

        response
            .json()
            .await
            .map_err(|err| GroceriesError::Network(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_data_parses_payment_token() {
        let data: AccountData = serde_json::from_value(json!({
            "payment": { "AccessTokenToCallThePaymentAPI": "eyJ0" }
        }))
        .expect("account data");

        assert_eq!(
            data.payment
                .and_then(|p| p.access_token_to_call_the_payment_api),
            Some("eyJ0".to_string())
        );
    }

    #[test]
    fn verify_code_response_parses_pascal_case_fields() {
        let response: VerifyCodeResponse = serde_json::from_value(json!({
            "ValidationPassed": true,
            "AuthType": "EmailMfa",
            "AuthValue": "alice@contoso.example"
        }))
        .expect("verify response");

        assert!(response.validation_passed);
        assert_eq!(response.auth_type, Some(AuthMethodKind::EmailMfa));
        assert_eq!(response.auth_value.as_deref(), Some("alice@contoso.example"));
    }

    #[test]
    fn verify_code_response_defaults_to_failed() {
        let response: VerifyCodeResponse = serde_json::from_value(json!({})).expect("empty");
        assert!(!response.validation_passed);
        assert!(response.auth_type.is_none());
    }
}
