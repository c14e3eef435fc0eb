//! Request handlers.
//!
//! Session resolution is re-derived on every request: the scheme router picks
//! the scheme from the cookie names, the scheme's cookie carries the ID token,
//! and the token is re-validated against the cached issuer configuration
//! before any claim is trusted.

pub mod health;
pub mod profile;
pub mod signin;
pub mod token;
pub mod verify_code;

use super::AppState;
use crate::auth::claims::{self, Principal};
use crate::auth::{router, validate, SchemeId};
use axum::{
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

/// Value of a named cookie from the request headers.
#[must_use]
pub fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            Some((parts.next()?, parts.next()?))
        })
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Resolve the signed-in user: select the scheme from the session cookies,
/// re-validate the stored ID token, and re-attach the scheme claim.
///
/// # Errors
/// `401 Unauthorized` when no session cookie is present or the token no
/// longer validates.
pub fn current_user(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<(SchemeId, Principal), StatusCode> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let scheme_id = router::select(router::cookie_names(cookie_header), None);
    let token = cookie_value(headers, scheme_id.cookie_name()).ok_or(StatusCode::UNAUTHORIZED)?;

    let scheme = state.schemes.get(scheme_id);
    let mut principal = validate::validate(scheme, token, None).map_err(|err| {
        debug!("Session token rejected: {err}");
        StatusCode::UNAUTHORIZED
    })?;
    claims::augment(&mut principal, scheme_id);

    Ok((scheme_id, principal))
}

/// App-only scope for the directory service, derived from the middleware
/// resource when configured.
pub(crate) fn directory_scope(state: &AppState) -> String {
    let base = state
        .settings
        .directory
        .middleware
        .base_url
        .as_deref()
        .unwrap_or(&state.settings.directory.service_url);
    format!("{}/.default", base.trim_end_matches('/'))
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
