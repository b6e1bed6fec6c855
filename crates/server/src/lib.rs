//! Report embed authorization for signed-in users.
//!
//! Turns an end user's sign-in into a scoped, time-limited embed token for a
//! single report: a cached service-account token calls the reporting API, and
//! the user's own token is exchanged on-behalf-of for a downstream data
//! resource token that is bound into the embed token as an effective identity.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::embed::EmbedService;
use crate::http::HttpClient;
use crate::identity::InboundTokenValidator;
use crate::reporting::ReportingClient;
use crate::tokens::{
    ConfidentialClient, OnBehalfOfExchanger, ServiceTokenCache, ServiceTokenRequest,
    TokenEndpoint,
};

pub mod api;
pub mod config;
pub mod embed;
pub mod error;
pub mod http;
pub mod identity;
pub mod reporting;
pub mod tokens;

/// Long-lived services shared by every request handler.
#[derive(Clone)]
pub struct AppResources {
    pub config: Arc<AppConfig>,
    pub embed: Arc<EmbedService>,
    pub inbound: Arc<InboundTokenValidator>,
}

impl AppResources {
    /// Wires the token caches and API clients from validated configuration.
    pub fn from_config(config: AppConfig) -> color_eyre::Result<Self> {
        config.validate()?;

        let http = HttpClient::new(config.http_timeout())?;
        let endpoint = TokenEndpoint::new(http.clone(), config.identity_provider.token_endpoint());

        let service_tokens = ServiceTokenCache::new(
            endpoint.clone(),
            ServiceTokenRequest {
                resource: config.service_account.resource.clone(),
                application_id: config.service_account.application_id.trim().to_string(),
                credentials: config.service_account.credentials()?,
            },
            config.token_refresh_margin(),
        );

        let exchanger = OnBehalfOfExchanger::new(
            endpoint,
            ConfidentialClient {
                client_id: config.client.client_id.clone(),
                client_secret: config.client.client_secret.clone(),
            },
            config.downstream.resource.as_str(),
            config.token_refresh_margin(),
        );

        let reporting = ReportingClient::new(http, &config.reporting.api_url);
        let embed = EmbedService::new(
            service_tokens,
            exchanger,
            reporting,
            config.reporting.workspace_id.trim(),
        );
        let inbound = InboundTokenValidator::from_config(&config.inbound)?;

        Ok(Self {
            config: Arc::new(config),
            embed: Arc::new(embed),
            inbound: Arc::new(inbound),
        })
    }
}
