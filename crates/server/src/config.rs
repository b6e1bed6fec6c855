use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Deserialize)]
pub struct IdentityProviderConfig {
    /// Authority host, e.g. `https://login.microsoftonline.com/`.
    #[serde(default = "default_instance")]
    pub instance: String,
    pub tenant_id: String,
}

impl IdentityProviderConfig {
    /// `{instance}/{tenant}/oauth2/token`
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/token",
            self.instance.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// The fixed service identity used to call the reporting API.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountConfig {
    pub application_id: String,
    #[serde(default = "default_reporting_resource")]
    pub resource: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// When set (and no username/password is), the client-credentials grant is used.
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceCredentials {
    Password { username: String, password: String },
    ClientSecret(String),
}

impl ServiceAccountConfig {
    pub fn credentials(&self) -> Result<ServiceCredentials, ConfigError> {
        match (
            non_blank(self.username.as_deref()),
            non_blank(self.password.as_deref()),
            non_blank(self.client_secret.as_deref()),
        ) {
            (Some(username), Some(password), _) => Ok(ServiceCredentials::Password {
                username: username.to_string(),
                password: password.to_string(),
            }),
            (Some(_), None, None) => Err(ConfigError::Validation(
                "service_account.password is empty. Please fill the password of the reporting service account".into(),
            )),
            (None, Some(_), None) => Err(ConfigError::Validation(
                "service_account.username is empty. Please fill the reporting service account username".into(),
            )),
            (_, _, Some(secret)) => Ok(ServiceCredentials::ClientSecret(secret.to_string())),
            (None, None, None) => Err(ConfigError::Validation(
                "service_account needs either username and password or a client_secret".into(),
            )),
        }
    }
}

/// Confidential client performing the on-behalf-of exchange.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone, Deserialize)]
pub struct DownstreamConfig {
    #[serde(default = "default_downstream_resource")]
    pub resource: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            resource: default_downstream_resource(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub workspace_id: String,
    /// Report to embed. Blank means "first report in the workspace".
    #[serde(default)]
    pub report_id: Option<String>,
}

impl ReportingConfig {
    pub fn configured_report_id(&self) -> Option<&str> {
        non_blank(self.report_id.as_deref())
    }
}

/// How the adapters trust the identity of an inbound request.
#[derive(Clone, Default, Deserialize)]
pub struct InboundAuthConfig {
    /// Expected `aud` of inbound bearer tokens.
    #[serde(default)]
    pub audience: Option<String>,
    /// Expected `iss` of inbound bearer tokens.
    #[serde(default)]
    pub issuer: Option<String>,
    /// RSA public key (PEM) that inbound bearer tokens are signed with.
    #[serde(default)]
    pub public_key_pem: Option<String>,
    /// Read bearer token claims without checking the signature. Only for
    /// deployments where a gateway in front already verified the token.
    #[serde(default)]
    pub allow_unverified_tokens: bool,
    /// Accept identity headers injected by an authenticating front proxy.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Seconds subtracted from a token's lifetime to refresh it early.
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
    pub identity_provider: IdentityProviderConfig,
    pub service_account: ServiceAccountConfig,
    pub client: ClientConfig,
    #[serde(default)]
    pub downstream: DownstreamConfig,
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub inbound: InboundAuthConfig,
}

impl AppConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }

    /// Checks the settings that would otherwise only fail once a request hits
    /// the identity provider or the reporting API.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_provider.tenant_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity_provider.tenant_id is empty".into(),
            ));
        }
        if self.service_account.application_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "service_account.application_id is empty. Please register your application and fill its client id".into(),
            ));
        }
        if Uuid::parse_str(self.service_account.application_id.trim()).is_err() {
            return Err(ConfigError::Validation(
                "service_account.application_id must be a Guid".into(),
            ));
        }
        if self.reporting.workspace_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "reporting.workspace_id is empty. Please select a workspace you own and fill its id".into(),
            ));
        }
        if Uuid::parse_str(self.reporting.workspace_id.trim()).is_err() {
            return Err(ConfigError::Validation(
                "reporting.workspace_id must be a Guid".into(),
            ));
        }
        if let Some(report_id) = self.reporting.configured_report_id()
            && Uuid::parse_str(report_id).is_err()
        {
            return Err(ConfigError::Validation(
                "reporting.report_id must be a Guid when set".into(),
            ));
        }
        if self.client.client_id.trim().is_empty() || self.client.client_secret.is_empty() {
            return Err(ConfigError::Validation(
                "client.client_id and client.client_secret are required for the on-behalf-of exchange".into(),
            ));
        }
        if non_blank(self.inbound.public_key_pem.as_deref()).is_none()
            && !self.inbound.allow_unverified_tokens
        {
            return Err(ConfigError::Validation(
                "inbound.public_key_pem is required to verify bearer tokens; set inbound.allow_unverified_tokens only when a gateway verifies them".into(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Validation("http_timeout_secs must be > 0".into()));
        }
        self.service_account.credentials()?;
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_instance() -> String {
    "https://login.microsoftonline.com/".into()
}

fn default_reporting_resource() -> String {
    "https://analysis.windows.net/powerbi/api".into()
}

fn default_downstream_resource() -> String {
    "https://database.windows.net/".into()
}

fn default_api_url() -> String {
    "https://api.powerbi.com/".into()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".into()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_token_refresh_margin_secs() -> u64 {
    120
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `REPORTING__WORKSPACE_ID`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(
        username: Option<&str>,
        password: Option<&str>,
        secret: Option<&str>,
    ) -> ServiceAccountConfig {
        ServiceAccountConfig {
            application_id: "6f1d3b52-3f5b-4b8e-9a51-0d4c2f6a7e10".into(),
            resource: default_reporting_resource(),
            username: username.map(String::from),
            password: password.map(String::from),
            client_secret: secret.map(String::from),
        }
    }

    #[test]
    fn password_credentials_win_over_client_secret() {
        let creds = account(Some("svc@contoso.com"), Some("pw"), Some("secret"))
            .credentials()
            .unwrap();
        assert_eq!(
            creds,
            ServiceCredentials::Password {
                username: "svc@contoso.com".into(),
                password: "pw".into()
            }
        );
    }

    #[test]
    fn client_secret_alone_selects_client_credentials() {
        let creds = account(None, None, Some("secret")).credentials().unwrap();
        assert_eq!(creds, ServiceCredentials::ClientSecret("secret".into()));
    }

    #[test]
    fn blank_credentials_are_rejected() {
        assert!(account(Some("  "), None, None).credentials().is_err());
        assert!(account(None, None, None).credentials().is_err());
        assert!(account(Some("svc"), None, None).credentials().is_err());
    }

    #[test]
    fn token_endpoint_joins_instance_and_tenant() {
        let idp = IdentityProviderConfig {
            instance: "https://login.microsoftonline.com/".into(),
            tenant_id: "contoso.onmicrosoft.com".into(),
        };
        assert_eq!(
            idp.token_endpoint(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/token"
        );
    }

    #[test]
    fn whitespace_report_id_counts_as_unset() {
        let reporting = ReportingConfig {
            api_url: default_api_url(),
            workspace_id: "b0f4e1a2-9c3d-4e5f-8a7b-6c5d4e3f2a1b".into(),
            report_id: Some("   ".into()),
        };
        assert_eq!(reporting.configured_report_id(), None);
    }
}
