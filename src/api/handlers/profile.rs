//! Profile attribute reads and writes.
//!
//! The read path uses an app-only token against the directory; the write path
//! goes through the middleware API with a user-scoped token. Either call can
//! come back with a claims challenge, which turns into a fresh sign-in
//! redirect instead of an error.

use super::{current_user, directory_scope, AppState};
use crate::auth::{challenge, tokens::resolve_downstream, SchemeId};
use crate::directory::{UpdateAttributes, UserAttributes};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use std::sync::Arc;
use tracing::warn;

const RETURN_URL: &str = "/api/user-attributes";

fn error_attributes(message: String) -> Json<UserAttributes> {
    Json(UserAttributes {
        error_message: Some(message),
        ..UserAttributes::default()
    })
}

/// GET /api/user-attributes
#[utoipa::path(
    get,
    path = "/api/user-attributes",
    responses(
        (status = 200, description = "Profile attributes, or an error message in place of them", body = UserAttributes),
        (status = 302, description = "Claims challenge: re-authentication required"),
        (status = 401, description = "No valid session")
    ),
    tag = "profile"
)]
pub async fn get_attributes(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let (_, principal) = match current_user(&headers, &state) {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };
    let Some(object_id) = principal.object_id() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let scheme = state.schemes.get(SchemeId::Default);
    let authorization = match state
        .broker
        .acquire_app(scheme, &directory_scope(&state))
        .await
    {
        Ok(authorization) => authorization,
        Err(err) => {
            return error_attributes(format!("Can't read the profile due to: {err}"))
                .into_response()
        }
    };

    match state.directory.get_profile(&authorization, object_id).await {
        Ok(attributes) => Json(attributes).into_response(),
        Err(err) => {
            // The directory error may carry a claims challenge; round-trip it
            // into a new sign-in redirect instead of surfacing the error.
            if let Some(challenge) = err.api_error().and_then(challenge::detect) {
                warn!("Claims challenge received from the directory");
                return Redirect::to(&challenge.redirect_location(RETURN_URL)).into_response();
            }
            error_attributes(format!("Can't read the profile due to: {err}")).into_response()
        }
    }
}

/// POST /api/user-attributes
#[utoipa::path(
    post,
    path = "/api/user-attributes",
    request_body(content = UpdateAttributes, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Updated attributes, or an error message in place of them", body = UserAttributes),
        (status = 302, description = "Claims challenge: re-authentication required"),
        (status = 401, description = "No valid session")
    ),
    tag = "profile"
)]
pub async fn update_attributes(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
    Form(update): Form<UpdateAttributes>,
) -> Response {
    let (_, principal) = match current_user(&headers, &state) {
        Ok(user) => user,
        Err(status) => return status.into_response(),
    };

    let resolved = match resolve_downstream(&state.settings.directory.middleware, "directory.middleware")
    {
        Ok(resolved) => resolved,
        Err(err) => return error_attributes(err.to_string()).into_response(),
    };

    let scheme = state.schemes.get(SchemeId::Default);
    let authorization = match state.broker.acquire(scheme, &principal, &resolved.scopes).await {
        Ok(authorization) => authorization,
        Err(err) => return error_attributes(err.to_string()).into_response(),
    };

    match state
        .directory
        .update_profile(&resolved.endpoint, &authorization, &update)
        .await
    {
        Ok(attributes) => Json(attributes).into_response(),
        Err(err) => {
            if let Some(challenge) = err.api_error().and_then(challenge::detect) {
                warn!("Claims challenge received from the middleware API");
                return Redirect::to(&challenge.redirect_location(RETURN_URL)).into_response();
            }
            error_attributes(format!("Can't update the profile due to: {err}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_attributes_carry_only_the_message() {
        let Json(attributes) = error_attributes("nope".to_string());
        assert_eq!(attributes.error_message.as_deref(), Some("nope"));
        assert!(attributes.object_id.is_empty());
    }
}
