//! Sign-in, callback, sign-out, and the error page.
//!
//! The sign-in redirect is the only place the three schemes converge: the
//! router picks one, the per-request properties shape the protocol message,
//! and the pending state entry binds the eventual callback to the scheme and
//! nonce that initiated it.

use super::{current_user, AppState};
use crate::api::PendingSignIn;
use crate::auth::{
    claims,
    error::{error_location, sanitize_description, ERROR_CODE_AUTH_FAILED, ERROR_CODE_REMOTE_FAILURE},
    properties::RedirectProperties,
    protocol::{customize, random_token, AuthorizationRequest},
    router, validate, SchemeId,
};
use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use url::form_urlencoded;

// Query parameters consumed by the handler itself; everything else is a
// sign-in property.
const RESERVED_PARAMS: [&str; 3] = ["handler", "return_url", "claims"];

/// Percent-encode a claims-challenge blob for the authorization URL. Legal
/// blobs carry `+`, `%`, and other reserved characters.
fn encode_claims(blob: &str) -> String {
    form_urlencoded::byte_serialize(blob.as_bytes()).collect()
}

/// GET /auth/signin
///
/// Builds the authorization redirect: scheme selection, property-driven
/// protocol customization, and the pending-state entry for the callback.
pub async fn signin(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let handler = params.get("handler").map(String::as_str);
    let return_url = params
        .get("return_url")
        .cloned()
        .unwrap_or_else(|| "/".to_string());
    let claims_challenge = params.get("claims").cloned();

    let pairs = params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()));
    let properties = match RedirectProperties::from_pairs(pairs) {
        Ok(properties) => properties,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    // A claims challenge always restarts sign-in on the default scheme; the
    // challenge was raised by a resource registered under it.
    let scheme_id = if claims_challenge.is_some() {
        SchemeId::Default
    } else {
        let cookie_header = headers
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        router::select(router::cookie_names(cookie_header), handler)
    };
    let scheme = state.schemes.get(scheme_id);

    let state_token = random_token(32);
    let nonce = random_token(32);

    let message = AuthorizationRequest::new(scheme, state_token.clone(), nonce.clone());
    let mut message = match customize(message, &properties) {
        Ok(message) => message,
        Err(err) => {
            return Redirect::to(&error_location(ERROR_CODE_AUTH_FAILED, &err.to_string()))
                .into_response()
        }
    };

    // Round-trip a provider-issued claims challenge. Extra protocol
    // parameters are appended raw, so the blob is percent-encoded here to
    // survive the provider's query decoding byte for byte.
    if let Some(claims) = claims_challenge {
        message.add_parameter("claims", encode_claims(&claims));
    }

    let location = match message.authorize_url() {
        Ok(url) => url,
        Err(err) => {
            return Redirect::to(&error_location(ERROR_CODE_AUTH_FAILED, &err.to_string()))
                .into_response()
        }
    };

    info!(scheme = scheme_id.name(), "Redirecting to the identity provider");

    state.pending.write().await.insert(
        state_token,
        PendingSignIn {
            scheme: scheme_id,
            nonce,
            return_url,
        },
    );

    Redirect::to(&location).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// GET /auth/callback
///
/// Redeems the authorization code, validates the ID token against the scheme
/// that initiated the redirect, and establishes the scheme's session cookie.
pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        warn!(error = %error, "Identity provider reported a sign-in failure");
        return Redirect::to(&error_location(&error, &description)).into_response();
    }

    let (Some(code), Some(state_token)) = (params.code, params.state) else {
        return Redirect::to(&error_location(
            ERROR_CODE_REMOTE_FAILURE,
            "The provider response is missing the code or state parameter",
        ))
        .into_response();
    };

    let Some(pending) = state.pending.write().await.remove(&state_token) else {
        return Redirect::to(&error_location(
            ERROR_CODE_REMOTE_FAILURE,
            "Unknown or expired sign-in state",
        ))
        .into_response();
    };

    let scheme = state.schemes.get(pending.scheme);

    let tokens = match state.broker.redeem_code(scheme, &code).await {
        Ok(tokens) => tokens,
        Err(err) => {
            return Redirect::to(&error_location(ERROR_CODE_REMOTE_FAILURE, &err.to_string()))
                .into_response()
        }
    };

    let Some(id_token) = tokens.id_token else {
        return Redirect::to(&error_location(
            ERROR_CODE_REMOTE_FAILURE,
            "The token response is missing the ID token",
        ))
        .into_response();
    };

    let mut principal = match validate::validate(scheme, &id_token, Some(&pending.nonce)) {
        Ok(principal) => principal,
        Err(err) => {
            return Redirect::to(&error_location(ERROR_CODE_AUTH_FAILED, &err.to_string()))
                .into_response()
        }
    };
    claims::augment(&mut principal, pending.scheme);

    // Mirror the sign-in grant into the token store so downstream calls can
    // acquire scoped tokens without another round-trip to the user.
    if let (Some(object_id), Some(refresh_token)) =
        (principal.object_id(), tokens.refresh_token)
    {
        state.broker.store(object_id, refresh_token.into()).await;
    }

    info!(
        scheme = pending.scheme.name(),
        user = principal.display_name().unwrap_or("unknown"),
        "Sign-in completed"
    );

    let cookie = format!(
        "{}={id_token}; Path=/; HttpOnly; Secure; SameSite=Lax",
        pending.scheme.cookie_name()
    );
    ([(header::SET_COOKIE, cookie)], Redirect::to(&pending.return_url)).into_response()
}

/// GET /auth/signout
///
/// Clears the active scheme's session cookie and drops the cached grant.
/// Other schemes' cookies are never touched.
pub async fn signout(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    if let Ok((_, principal)) = current_user(&headers, &state) {
        if let Some(object_id) = principal.object_id() {
            state.broker.clear(object_id).await;
        }
    }

    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let scheme_id = router::select(router::cookie_names(cookie_header), None);

    let expired = format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0",
        scheme_id.cookie_name()
    );
    ([(header::SET_COOKIE, expired)], Redirect::to("/")).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ErrorParams {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub description: String,
}

/// GET /auth/error
pub async fn auth_error(Query(params): Query<ErrorParams>) -> (StatusCode, String) {
    warn!(error = %params.error, "Authentication error page viewed");

    (
        StatusCode::OK,
        format!(
            "Authentication error {}: {}",
            sanitize_description(&params.error),
            sanitize_description(&params.description)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_page_sanitizes_both_fields() {
        let (status, body) = auth_error(Query(ErrorParams {
            error: "APP_AUTH_0001".to_string(),
            description: "bad\r\nthing".to_string(),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Authentication error APP_AUTH_0001: badthing");
    }

    #[test]
    fn reserved_params_are_not_signin_properties() {
        for key in RESERVED_PARAMS {
            assert!(RedirectProperties::from_pairs([(key, "x")]).is_err());
        }
    }

    #[test]
    fn claims_blob_survives_query_decoding() {
        // Base64 blobs legitimately contain '+' and may contain '%'-escapes;
        // the encoded form must decode back to the exact original bytes.
        let blob = "eyJhYis+Q2/3%7d==";
        let encoded = encode_claims(blob);

        let query = format!("claims={encoded}");
        let (key, value) = form_urlencoded::parse(query.as_bytes())
            .next()
            .expect("pair");
        assert_eq!(key, "claims");
        assert_eq!(value, blob);
    }

    #[test]
    fn encoded_claims_blob_round_trips_through_the_authorize_url() {
        use crate::auth::protocol::AuthorizationRequest;
        use crate::auth::{testutil, SchemeId};

        let blob = "eyJhYis+Q2/3%7d==";
        let scheme = testutil::scheme(SchemeId::Default);

        let mut message =
            AuthorizationRequest::new(&scheme, "st".to_string(), "no".to_string());
        message.add_parameter("claims", encode_claims(blob));
        let url = message.authorize_url().expect("url");

        let query = url.split_once('?').expect("query").1;
        let decoded = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "claims")
            .expect("claims parameter")
            .1;
        assert_eq!(decoded, blob);
    }
}
