//! JSON embed configuration endpoint.

use crate::AppResources;
use crate::api::auth::{AuthRejection, BearerIdentity};
use crate::embed::EmbedConfig;
use axum::Json;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const EMBED_TAG: &str = "Embed";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(get_embed_config))
}

/// Embed configuration for the configured report, scoped to the caller.
#[tracing::instrument(skip_all, fields(principal = identity.principal_name()))]
#[utoipa::path(
    get,
    path = "/embed",
    tag = EMBED_TAG,
    operation_id = "Get Embed Configuration",
    summary = "Embed token for the configured report",
    description = "Exchanges the caller's bearer token on-behalf-of for the downstream data resource and \
                   returns an embed token bound to that identity.\n\n\
                   Failures are reported in `errorMessage` with status 200; the token fields are then absent.",
    responses(
        (status = 200, description = "Embed configuration or error message", body = EmbedConfig, content_type = "application/json"),
        (status = 401, description = "Missing or invalid bearer token", body = AuthRejection, content_type = "application/json")
    ),
    security(("Authorization" = []))
)]
pub async fn get_embed_config(
    axum::Extension(resources): axum::Extension<AppResources>,
    BearerIdentity(identity): BearerIdentity,
) -> Json<EmbedConfig> {
    let report_id = resources.config.reporting.configured_report_id();
    Json(resources.embed.build_embed_config(&identity, report_id).await)
}
