use embed_token_broker::AppResources;
use embed_token_broker::api::start_webserver;
use embed_token_broker::config::load_config;
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "embed_token_broker=info,hyper=warn,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; config.yaml and the real environment still apply.
    dotenvy::dotenv().ok();

    initialize_tracing();

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .map_err(|_| color_eyre::eyre::eyre!("Failed to install crypto provider"))?;

    let config = load_config()?;
    tracing::info!(
        tenant = %config.identity_provider.tenant_id,
        workspace_id = %config.reporting.workspace_id,
        report_id = config.reporting.configured_report_id().unwrap_or("<first in workspace>"),
        downstream_resource = %config.downstream.resource,
        trust_proxy_headers = config.inbound.trust_proxy_headers,
        "Loaded configuration"
    );

    let resources = AppResources::from_config(config)?;
    start_webserver(resources).await
}
