//! OpenAPI document served at /api-docs/openapi.json and browsable through
//! the Swagger UI.

use crate::api::handlers;
use crate::directory::{UpdateAttributes, UserAttributes};
use crate::downstream::{
    AccountData, AuthMethodKind, PaymentData, VerifyCodeRequest, VerifyCodeResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::token::token_report,
        handlers::profile::get_attributes,
        handlers::profile::update_attributes,
        handlers::verify_code::verify_code,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::token::TokenReport,
        handlers::verify_code::VerifyCodeOutcome,
        handlers::verify_code::VerifyStatus,
        UserAttributes,
        UpdateAttributes,
        AccountData,
        PaymentData,
        AuthMethodKind,
        VerifyCodeRequest,
        VerifyCodeResponse,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Sign-in pipeline and step-up verification"),
        (name = "profile", description = "User profile attributes"),
        (name = "tokens", description = "Token diagnostics")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
