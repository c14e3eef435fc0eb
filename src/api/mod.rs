use crate::{
    auth::{metadata::MetadataResolver, tokens::TokenBroker, SchemeId, SchemeSet},
    config::Settings,
    directory::DirectoryClient,
    downstream::GroceriesClient,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::{collections::HashMap, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::ApiDoc;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Outbound HTTP client shared by all collaborators. TLS is pinned to 1.2 or
/// higher.
///
/// # Errors
/// Returns an error if the client cannot be constructed.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .build()
        .context("Failed to build the outbound HTTP client")
}

/// One in-flight sign-in redirect, keyed by its `state` value. Lifetime is a
/// single redirect round-trip.
#[derive(Debug)]
pub struct PendingSignIn {
    pub scheme: SchemeId,
    pub nonce: String,
    pub return_url: String,
}

#[derive(Debug)]
pub struct AppState {
    pub settings: Settings,
    pub schemes: SchemeSet,
    pub broker: TokenBroker,
    pub directory: DirectoryClient,
    pub groceries: GroceriesClient,
    pub pending: RwLock<HashMap<String, PendingSignIn>>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, settings: Settings) -> Result<()> {
    let client = http_client()?;

    // Resolve issuer metadata for every scheme up front. A failure here is
    // fatal: the process cannot validate tokens without signing keys.
    let resolver = MetadataResolver::new(client.clone());
    let schemes = SchemeSet::bootstrap(&resolver, &settings.schemes).await?;

    let directory = DirectoryClient::new(client.clone(), settings.directory.service_url.clone());
    let state = Arc::new(AppState {
        schemes,
        directory,
        groceries: GroceriesClient::new(client.clone()),
        broker: TokenBroker::new(client),
        settings,
        pending: RwLock::new(HashMap::new()),
    });

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Build the application router with all routes and layers registered.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::health))
        .route("/auth/signin", get(handlers::signin::signin))
        .route("/auth/callback", get(handlers::signin::callback))
        .route("/auth/signout", get(handlers::signin::signout))
        .route("/auth/error", get(handlers::signin::auth_error))
        .route("/api/token", get(handlers::token::token_report))
        .route(
            "/api/user-attributes",
            get(handlers::profile::get_attributes).post(handlers::profile::update_attributes),
        )
        .route("/api/verify-code", post(handlers::verify_code::verify_code))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_request: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
