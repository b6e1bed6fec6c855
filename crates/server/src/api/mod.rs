//! HTTP surface of the embed broker.
//!
//! Two thin adapters over the one embed service:
//! - `embed` - JSON embed configuration for bearer-authenticated callers (/api/embed)
//! - `page` - server-rendered embed page behind an authenticating proxy (/)
//!
//! plus `health` (/healthz) and `openapi` (/api-docs).

pub mod auth;
pub mod embed;
pub mod health;
pub mod openapi;
pub mod page;

pub use embed::EMBED_TAG;
pub use health::MISC_TAG;

use crate::AppResources;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Builds the full router with all routes and middleware layers attached.
pub fn app(app_resources: AppResources) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api", embed::router())
        .routes(routes!(health::health))
        .split_for_parts();

    router
        .route("/", axum::routing::get(page::embed_page))
        .merge(Redoc::with_url("/api-docs", api))
        .layer(axum::Extension(app_resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let bind_address = app_resources.config.bind_address.clone();
    let router = app(app_resources);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(addr = %bind_address, "Server running");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
