//! One-time-code verification gateway.
//!
//! The step-up check runs first and is terminal: without the elevated
//! authentication context no outbound call is made at all. After a passed
//! verification the verified factor is written back to the directory;
//! write-back failures are logged and never fail the verification response.

use super::{current_user, directory_scope, AppState};
use crate::auth::claims::Principal;
use crate::auth::tokens::{resolve_downstream, AcquireError};
use crate::auth::SchemeId;
use crate::downstream::{AuthMethodKind, VerifyCodeRequest, VerifyCodeResponse};
use axum::{
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

const STEP_UP_REQUIRED: &str = "Multi-factor authentication is required for this operation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum VerifyStatus {
    Success,
    ValidationFailed,
    ConfigurationError,
    NetworkError,
    AuthorizationError,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeOutcome {
    pub status: VerifyStatus,
    pub message: String,
    pub validation_passed: bool,
}

impl VerifyCodeOutcome {
    fn rejected() -> Self {
        Self {
            status: VerifyStatus::AuthorizationError,
            message: STEP_UP_REQUIRED.to_string(),
            validation_passed: false,
        }
    }

    fn configuration(message: String) -> Self {
        Self {
            status: VerifyStatus::ConfigurationError,
            message,
            validation_passed: false,
        }
    }

    fn network(message: String) -> Self {
        Self {
            status: VerifyStatus::NetworkError,
            message,
            validation_passed: false,
        }
    }

    fn from_downstream(response: &VerifyCodeResponse) -> Self {
        if response.validation_passed {
            Self {
                status: VerifyStatus::Success,
                message: response
                    .message
                    .clone()
                    .unwrap_or_else(|| "The code has been verified.".to_string()),
                validation_passed: true,
            }
        } else {
            Self {
                status: VerifyStatus::ValidationFailed,
                message: response
                    .message
                    .clone()
                    .unwrap_or_else(|| "The code is invalid.".to_string()),
                validation_passed: false,
            }
        }
    }
}

/// Step-up gate. Terminal on rejection: the caller must re-authenticate with
/// the elevated context before any verification traffic is sent.
fn ensure_step_up(principal: &Principal) -> Result<(), VerifyCodeOutcome> {
    if principal.step_up_satisfied() {
        Ok(())
    } else {
        Err(VerifyCodeOutcome::rejected())
    }
}

/// POST /api/verify-code
#[utoipa::path(
    post,
    path = "/api/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Verification outcome", body = VerifyCodeOutcome),
        (status = 401, description = "No valid session")
    ),
    tag = "auth"
)]
pub async fn verify_code(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<VerifyCodeRequest>,
) -> Response {
    let (_, principal) = match current_user(&headers, &state) {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };

    if let Err(outcome) = ensure_step_up(&principal) {
        return Json(outcome).into_response();
    }

    let resolved = match resolve_downstream(&state.settings.groceries_api, "groceries_api") {
        Ok(resolved) => resolved,
        Err(err) => return Json(VerifyCodeOutcome::configuration(err.to_string())).into_response(),
    };

    // The groceries scopes are registered under the default scheme's client;
    // only a default-scheme grant can be exchanged for them.
    let scheme = state.schemes.get(SchemeId::Default);
    let authorization = match state.broker.acquire(scheme, &principal, &resolved.scopes).await {
        Ok(authorization) => authorization,
        Err(AcquireError::Network(message)) => {
            return Json(VerifyCodeOutcome::network(message)).into_response()
        }
        Err(err) => {
            return Json(VerifyCodeOutcome::configuration(err.to_string())).into_response()
        }
    };

    let endpoint = format!("{}VerifyCode", resolved.endpoint);
    let response = match state
        .groceries
        .post_verify_code(&endpoint, &authorization, &request)
        .await
    {
        Ok(response) => response,
        Err(err) => return Json(VerifyCodeOutcome::network(err.to_string())).into_response(),
    };

    if response.validation_passed {
        info!("One-time code verified");
        if let (Some(kind), Some(email)) = (response.auth_type, response.auth_value.as_deref()) {
            if let Some(object_id) = principal.object_id() {
                apply_verified_method(&state, object_id, kind, email).await;
            }
        }
    }

    Json(VerifyCodeOutcome::from_downstream(&response)).into_response()
}

/// Write the verified factor back to the directory. Failures are logged only.
async fn apply_verified_method(state: &AppState, object_id: &str, kind: AuthMethodKind, email: &str) {
    let scheme = state.schemes.get(SchemeId::Default);
    let authorization = match state
        .broker
        .acquire_app(scheme, &directory_scope(state))
        .await
    {
        Ok(authorization) => authorization,
        Err(err) => {
            error!("Failed to acquire a directory token for the method update: {err}");
            return;
        }
    };

    let result = match kind {
        AuthMethodKind::SignInEmail => {
            state
                .directory
                .update_sign_in_email(&authorization, object_id, email)
                .await
        }
        AuthMethodKind::EmailMfa => {
            state
                .directory
                .update_email_mfa_method(&authorization, object_id, email)
                .await
        }
    };

    if let Err(err) = result {
        error!("Failed to update the verified method in the directory: {err}");
    }
}
