//! Token diagnostics: what the current session can obtain and from where.

use super::{current_user, AppState};
use crate::auth::tokens::resolve_downstream;
use axum::{
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    /// Scheme that authenticated the current session.
    pub auth_scheme: Option<String>,
    pub id_token_expires_in: Option<String>,
    /// Access token acquired for the groceries API from the cached grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_error: Option<String>,
    /// Token the account API obtained for the payment API on our behalf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream_access_token_error: Option<String>,
}

fn format_remaining(seconds: i64) -> String {
    let clamped = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        clamped / 3600,
        (clamped % 3600) / 60,
        clamped % 60
    )
}

/// GET /api/token
#[utoipa::path(
    get,
    path = "/api/token",
    responses(
        (status = 200, description = "Token report for the current session", body = TokenReport),
        (status = 401, description = "No valid session")
    ),
    tag = "tokens"
)]
pub async fn token_report(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let (scheme_id, principal) = match current_user(&headers, &state) {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };

    let mut report = TokenReport {
        auth_scheme: Some(scheme_id.name().to_string()),
        ..TokenReport::default()
    };

    if let Some(exp) = principal.get("exp").and_then(|value| value.parse::<i64>().ok()) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX));
        report.id_token_expires_in = Some(format!(
            "The ID token expires in {}",
            format_remaining(exp - now)
        ));
    }

    let resolved = match resolve_downstream(&state.settings.groceries_api, "groceries_api") {
        Ok(resolved) => resolved,
        Err(err) => {
            report.access_token_error = Some(err.to_string());
            return Json(report).into_response();
        }
    };

    let scheme = state.schemes.get(scheme_id);
    match state.broker.acquire(scheme, &principal, &resolved.scopes).await {
        Ok(authorization) => {
            report.access_token = Some(
                authorization
                    .strip_prefix("Bearer ")
                    .unwrap_or(&authorization)
                    .to_string(),
            );

            let endpoint = format!("{}account", resolved.endpoint);
            match state.groceries.get_account(&endpoint, &authorization).await {
                Ok(account) => {
                    if let Some(error) = account.error {
                        report.downstream_access_token_error = Some(error);
                    } else if let Some(token) = account
                        .payment
                        .and_then(|payment| payment.access_token_to_call_the_payment_api)
                    {
                        report.downstream_access_token = Some(token);
                    } else {
                        report.downstream_access_token_error =
                            Some("Payment information is missing in the account data.".to_string());
                    }
                }
                Err(err) => report.downstream_access_token_error = Some(err.to_string()),
            }
        }
        Err(err) => report.access_token_error = Some(err.to_string()),
    }

    Json(report).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_formats_as_clock() {
        assert_eq!(format_remaining(0), "00:00:00");
        assert_eq!(format_remaining(59), "00:00:59");
        assert_eq!(format_remaining(61), "00:01:01");
        assert_eq!(format_remaining(3723), "01:02:03");
    }

    #[test]
    fn expired_tokens_clamp_to_zero() {
        assert_eq!(format_remaining(-42), "00:00:00");
    }

    #[test]
    fn report_skips_absent_tokens() {
        let report = TokenReport {
            auth_scheme: Some("OpenIdConnect".to_string()),
            ..TokenReport::default()
        };
        let value = serde_json::to_value(&report).expect("json");
        assert!(value.get("accessToken").is_none());
        assert!(value.get("accessTokenError").is_none());
        assert_eq!(value["authScheme"], "OpenIdConnect");
    }
}
