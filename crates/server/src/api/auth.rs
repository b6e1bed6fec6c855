//! Identity extractors for the two adapters.
//!
//! - [`BearerIdentity`] reads `Authorization: Bearer <jwt>`; the JWT is both
//!   the source of the principal claims and the bootstrap token.
//! - [`ProxyIdentity`] reads the headers an authenticating front proxy injects.

use crate::AppResources;
use crate::identity::UserIdentity;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Principal name set by the front proxy.
pub const PRINCIPAL_NAME_HEADER: &str = "x-ms-client-principal-name";
/// Access token the front proxy obtained for the user.
pub const PROXY_ACCESS_TOKEN_HEADER: &str = "x-ms-token-aad-access-token";
/// ID token the front proxy obtained for the user.
pub const PROXY_ID_TOKEN_HEADER: &str = "x-ms-token-aad-id-token";

/// Error body for rejected requests
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthRejection {
    /// Error code (e.g., "invalid_token")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthRejection {
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_token".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_string(),
            error_description: None,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "invalid_token" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn resources(parts: &Parts) -> Result<AppResources, AuthRejection> {
    parts
        .extensions
        .get::<AppResources>()
        .cloned()
        .ok_or_else(|| {
            tracing::error!("AppResources not found in extensions");
            AuthRejection::server_error()
        })
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Axum extractor for callers presenting their own bearer JWT.
pub struct BearerIdentity(pub UserIdentity);

impl<S> FromRequestParts<S> for BearerIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = resources(parts)?;

        let token = match header(parts, "authorization") {
            Some(value) => value
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    AuthRejection::invalid_token("Authorization header must use Bearer scheme")
                })?,
            None => return Err(AuthRejection::invalid_token("Missing Authorization header")),
        };

        let identity = resources.inbound.identify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected inbound bearer token");
            AuthRejection::invalid_token(format!("Bearer token rejected: {e}"))
        })?;
        Ok(BearerIdentity(identity))
    }
}

/// Axum extractor for requests authenticated by a front proxy.
///
/// Only honoured when `inbound.trust_proxy_headers` is enabled, since anyone
/// can set these headers when the service is reachable directly.
pub struct ProxyIdentity(pub UserIdentity);

impl<S> FromRequestParts<S> for ProxyIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = resources(parts)?;
        if !resources.config.inbound.trust_proxy_headers {
            return Err(AuthRejection::invalid_token(
                "Proxy identity headers are not trusted by this deployment",
            ));
        }

        let principal = header(parts, PRINCIPAL_NAME_HEADER)
            .ok_or_else(|| AuthRejection::invalid_token("Request was not authenticated"))?;
        let bootstrap = header(parts, PROXY_ACCESS_TOKEN_HEADER)
            .or_else(|| header(parts, PROXY_ID_TOKEN_HEADER))
            .map(String::from);

        // The proxy does not say whether the principal is a UPN or an email;
        // both resolve to the same principal name.
        Ok(ProxyIdentity(UserIdentity::new(
            Some(principal.to_string()),
            None,
            bootstrap,
        )))
    }
}
