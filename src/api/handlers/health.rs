use crate::api::GIT_COMMIT_HASH;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = Health)
    ),
    tag = "health"
)]
pub async fn health() -> (StatusCode, HeaderMap, Json<Health>) {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        GIT_COMMIT_HASH
    )) {
        headers.insert("x-app", value);
    }

    (
        StatusCode::OK,
        headers,
        Json(Health {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            commit: GIT_COMMIT_HASH,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_name_and_version() {
        let (status, headers, Json(body)) = health().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.name, env!("CARGO_PKG_NAME"));
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));

        let app = headers.get("x-app").expect("x-app header");
        assert!(app
            .to_str()
            .expect("ascii")
            .starts_with(&format!("{}:{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))));
    }
}
