//! Embed authorization: ties the service token, the on-behalf-of exchange and
//! the reporting API together into one embed configuration.

use crate::error::{EmbedError, NotFoundError};
use crate::identity::UserIdentity;
use crate::reporting::{EffectiveIdentity, GenerateTokenRequest, Report, ReportingClient};
use crate::tokens::{OnBehalfOfExchanger, ServiceTokenCache};
use serde::Serialize;
use utoipa::ToSchema;

/// What the page needs to embed one report, or why it cannot.
#[derive(Clone, Debug, Default, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_token: Option<String>,
    /// Identifier the reporting service assigned to the embed token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_token_expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EmbedConfig {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

pub struct EmbedService {
    service_tokens: ServiceTokenCache,
    exchanger: OnBehalfOfExchanger,
    reporting: ReportingClient,
    workspace_id: String,
}

impl EmbedService {
    pub fn new(
        service_tokens: ServiceTokenCache,
        exchanger: OnBehalfOfExchanger,
        reporting: ReportingClient,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            service_tokens,
            exchanger,
            reporting,
            workspace_id: workspace_id.into(),
        }
    }

    pub fn service_tokens(&self) -> &ServiceTokenCache {
        &self.service_tokens
    }

    pub fn exchanger(&self) -> &OnBehalfOfExchanger {
        &self.exchanger
    }

    /// Builds the embed configuration for `identity`. Never fails: every
    /// error ends up in [`EmbedConfig::error_message`].
    #[tracing::instrument(name = "build_embed_config", skip(self), fields(workspace_id = %self.workspace_id))]
    pub async fn build_embed_config(
        &self,
        identity: &UserIdentity,
        report_id: Option<&str>,
    ) -> EmbedConfig {
        match self.try_build(identity, report_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, source = ?std::error::Error::source(&e), "Embed configuration failed");
                EmbedConfig::error(e.to_string())
            }
        }
    }

    async fn try_build(
        &self,
        identity: &UserIdentity,
        report_id: Option<&str>,
    ) -> Result<EmbedConfig, EmbedError> {
        if self.workspace_id.trim().is_empty() {
            return Err(EmbedError::Configuration(
                "WorkspaceId is empty. Please select a workspace you own and fill its Id in the configuration".into(),
            ));
        }

        let service_token = self
            .service_tokens
            .get_service_token()
            .await
            .map_err(EmbedError::ServiceToken)?;

        let reports = self
            .reporting
            .list_reports(&service_token, &self.workspace_id)
            .await?;
        let report = select_report(reports, report_id)?;
        let dataset_id = report
            .dataset_id
            .clone()
            .ok_or_else(|| EmbedError::MissingDataset(report.id.clone()))?;

        let downstream = self
            .exchanger
            .exchange_for_downstream_token(identity)
            .await
            .map_err(EmbedError::Auth)?;

        let request =
            GenerateTokenRequest::view(EffectiveIdentity::for_dataset(&dataset_id, downstream));
        let embed_token = self
            .reporting
            .generate_embed_token(&service_token, &self.workspace_id, &report.id, &request)
            .await?
            .ok_or(EmbedError::Integrity)?;

        tracing::info!(report_id = %report.id, "Generated embed token");
        Ok(EmbedConfig {
            embed_token: Some(embed_token.token),
            embed_token_id: embed_token.token_id,
            embed_token_expiration: embed_token.expiration,
            embed_url: Some(report.embed_url),
            report_id: Some(report.id),
            error_message: None,
        })
    }
}

/// Blank id picks the first report as listed; otherwise an exact id match.
fn select_report(reports: Vec<Report>, report_id: Option<&str>) -> Result<Report, NotFoundError> {
    if reports.is_empty() {
        return Err(NotFoundError::NoReports);
    }
    match report_id.map(str::trim).filter(|id| !id.is_empty()) {
        None => reports.into_iter().next().ok_or(NotFoundError::NoReports),
        Some(id) => reports
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(NotFoundError::ReportNotFound),
    }
}
