//! Shared fixtures: configuration pointed at a wiremock server that plays both
//! the identity provider and the reporting API.

#![allow(dead_code)]

use embed_token_broker::AppResources;
use embed_token_broker::config::{
    AppConfig, ClientConfig, DownstreamConfig, IdentityProviderConfig, InboundAuthConfig,
    ReportingConfig, ServiceAccountConfig,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "contoso-tenant";
pub const WORKSPACE_ID: &str = "b0f4e1a2-9c3d-4e5f-8a7b-6c5d4e3f2a1b";
pub const APPLICATION_ID: &str = "6f1d3b52-3f5b-4b8e-9a51-0d4c2f6a7e10";
pub const CLIENT_ID: &str = "3c9e7a11-5b2d-4f6e-8c1a-9d0b2e4f6a8c";
pub const SQL_RESOURCE: &str = "https://database.windows.net/";

/// Key pair the test identity provider signs user tokens with.
pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/inbound_signing_key.pem");
pub const VERIFYING_KEY_PEM: &str = include_str!("../fixtures/inbound_signing_key.pub.pem");

pub fn token_path() -> String {
    format!("/{TENANT}/oauth2/token")
}

pub fn reports_path() -> String {
    format!("/v1.0/myorg/groups/{WORKSPACE_ID}/reports")
}

pub fn generate_token_path(report_id: &str) -> String {
    format!("/v1.0/myorg/groups/{WORKSPACE_ID}/reports/{report_id}/GenerateToken")
}

pub fn test_config(server_uri: &str) -> AppConfig {
    AppConfig {
        bind_address: "127.0.0.1:0".into(),
        http_timeout_secs: 5,
        token_refresh_margin_secs: 120,
        identity_provider: IdentityProviderConfig {
            instance: format!("{server_uri}/"),
            tenant_id: TENANT.into(),
        },
        service_account: ServiceAccountConfig {
            application_id: APPLICATION_ID.into(),
            resource: "https://analysis.windows.net/powerbi/api".into(),
            username: Some("svc-reports@contoso.com".into()),
            password: Some("correct horse".into()),
            client_secret: None,
        },
        client: ClientConfig {
            client_id: CLIENT_ID.into(),
            client_secret: "obo-secret".into(),
        },
        downstream: DownstreamConfig {
            resource: SQL_RESOURCE.into(),
        },
        reporting: ReportingConfig {
            api_url: format!("{server_uri}/"),
            workspace_id: WORKSPACE_ID.into(),
            report_id: None,
        },
        inbound: InboundAuthConfig {
            public_key_pem: Some(VERIFYING_KEY_PEM.into()),
            trust_proxy_headers: true,
            ..Default::default()
        },
    }
}

pub fn test_resources(server: &MockServer) -> AppResources {
    AppResources::from_config(test_config(&server.uri())).expect("build resources")
}

fn with_future_exp(mut claims: Value) -> Value {
    claims["exp"] = json!(time::OffsetDateTime::now_utc().unix_timestamp() + 3600);
    claims
}

/// A user token signed by the test identity provider.
pub fn user_jwt(claims: Value) -> String {
    encode(
        &Header::new(Algorithm::RS256),
        &with_future_exp(claims),
        &EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).expect("signing key"),
    )
    .expect("encode jwt")
}

/// A token with the same shape, signed with a key the service does not trust.
pub fn self_signed_jwt(claims: Value, secret: &[u8]) -> String {
    encode(
        &Header::default(),
        &with_future_exp(claims),
        &EncodingKey::from_secret(secret),
    )
    .expect("encode jwt")
}

pub fn token_body(access_token: &str, expires_in: u64) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "expires_in": expires_in.to_string(),
    })
}

pub fn report_json(id: &str, dataset_id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Report {id}"),
        "datasetId": dataset_id,
        "embedUrl": format!("https://embed/{id}"),
    })
}

pub async fn mount_service_token(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, 3600)))
        .mount(server)
        .await;
}

pub async fn mount_obo_token(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("requested_token_use=on_behalf_of"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, 3600)))
        .mount(server)
        .await;
}

pub async fn mount_reports(server: &MockServer, reports: Value) {
    Mock::given(method("GET"))
        .and(path(reports_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": reports })))
        .mount(server)
        .await;
}
