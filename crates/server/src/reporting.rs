//! Client for the remote reporting REST API.

use crate::error::{RemoteApiError, ReportingError};
use crate::http::{HttpClient, HttpResponse};
use crate::tokens::{DownstreamAccessToken, ServiceToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Response header carrying the reporting API's request id.
pub const REQUEST_ID_HEADER: &str = "RequestId";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Absent for reports that are not backed by a dataset (e.g. paginated reports).
    #[serde(default)]
    pub dataset_id: Option<String>,
    pub embed_url: String,
}

#[derive(Deserialize)]
struct ODataList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    View,
}

#[derive(Clone, Serialize)]
pub struct IdentityBlob {
    pub value: String,
}

/// Binds the embed token to a downstream identity. `username` is never set:
/// the identity travels only in the blob, scoped to `datasets`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub datasets: BTreeSet<String>,
    pub identity_blob: IdentityBlob,
}

impl EffectiveIdentity {
    pub fn for_dataset(dataset_id: &str, downstream: DownstreamAccessToken) -> Self {
        Self {
            username: None,
            datasets: BTreeSet::from([dataset_id.to_string()]),
            identity_blob: IdentityBlob {
                value: downstream.into_value(),
            },
        }
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenRequest {
    pub access_level: AccessLevel,
    pub identities: Vec<EffectiveIdentity>,
}

impl GenerateTokenRequest {
    pub fn view(identity: EffectiveIdentity) -> Self {
        Self {
            access_level: AccessLevel::View,
            identities: vec![identity],
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedToken {
    pub token: String,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedTokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    expiration: Option<String>,
}

#[derive(Clone)]
pub struct ReportingClient {
    http: HttpClient,
    api_url: Arc<str>,
}

impl ReportingClient {
    pub fn new(http: HttpClient, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').into(),
        }
    }

    fn group_url(&self, workspace_id: &str) -> String {
        format!("{}/v1.0/myorg/groups/{}", self.api_url, workspace_id)
    }

    /// Reports in the workspace, in the order the API returns them.
    #[tracing::instrument(name = "list_reports", skip(self, token))]
    pub async fn list_reports(
        &self,
        token: &ServiceToken,
        workspace_id: &str,
    ) -> Result<Vec<Report>, ReportingError> {
        let url = format!("{}/reports", self.group_url(workspace_id));
        let response = self.http.get_with_bearer(&url, token.value()).await?;
        let response = ensure_success(response)?;
        let list: ODataList<Report> = response.json()?;
        tracing::debug!(count = list.value.len(), "Listed reports");
        Ok(list.value)
    }

    /// Requests an embed token. `Ok(None)` means the call succeeded but no
    /// token came back.
    #[tracing::instrument(name = "generate_embed_token", skip(self, token, request))]
    pub async fn generate_embed_token(
        &self,
        token: &ServiceToken,
        workspace_id: &str,
        report_id: &str,
        request: &GenerateTokenRequest,
    ) -> Result<Option<EmbedToken>, ReportingError> {
        let url = format!(
            "{}/reports/{}/GenerateToken",
            self.group_url(workspace_id),
            report_id
        );
        let response = self
            .http
            .post_json_with_bearer(&url, token.value(), request)
            .await?;
        let response = ensure_success(response)?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let body: Option<EmbedTokenResponse> = response.json()?;
        Ok(body.and_then(|b| {
            let token = b.token.filter(|t| !t.is_empty())?;
            Some(EmbedToken {
                token,
                token_id: b.token_id,
                expiration: b.expiration,
            })
        }))
    }
}

fn ensure_success(response: HttpResponse) -> Result<HttpResponse, RemoteApiError> {
    if response.status.is_success() {
        return Ok(response);
    }
    let err = RemoteApiError {
        status: response.status,
        body: response.text(),
        request_id: response.header(REQUEST_ID_HEADER),
    };
    tracing::warn!(status = %err.status, request_id = ?err.request_id, "Reporting API call failed");
    Err(err)
}
