//! Server-rendered embed page for users signed in through the front proxy.

use crate::AppResources;
use crate::api::auth::ProxyIdentity;
use crate::embed::EmbedConfig;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

#[derive(Template)]
#[template(path = "embed.html")]
struct EmbedPageTemplate {
    principal: String,
    embed_token: String,
    embed_url: String,
    report_id: String,
    error_message: Option<String>,
}

impl EmbedPageTemplate {
    fn new(principal: &str, config: EmbedConfig) -> Self {
        Self {
            principal: principal.to_string(),
            embed_token: config.embed_token.unwrap_or_default(),
            embed_url: config.embed_url.unwrap_or_default(),
            report_id: config.report_id.unwrap_or_default(),
            error_message: config.error_message,
        }
    }
}

#[tracing::instrument(skip_all, fields(principal = identity.principal_name()))]
pub async fn embed_page(
    axum::Extension(resources): axum::Extension<AppResources>,
    ProxyIdentity(identity): ProxyIdentity,
) -> Response {
    let report_id = resources.config.reporting.configured_report_id();
    let config = resources.embed.build_embed_config(&identity, report_id).await;
    let page = EmbedPageTemplate::new(identity.principal_name().unwrap_or_default(), config);

    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render embed page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}
