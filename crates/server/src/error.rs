use hyper::StatusCode;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("JSON parse error: {0}")]
    Json(String),
}

fn describe(code: &Option<String>, description: &Option<String>) -> String {
    description
        .as_deref()
        .or(code.as_deref())
        .unwrap_or("no error description")
        .to_string()
}

/// Failures talking to the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token endpoint returned HTTP {status}: {}", describe(.code, .description))]
    TokenEndpoint {
        status: StatusCode,
        code: Option<String>,
        description: Option<String>,
    },
    #[error("No cached or refreshable token for {0}")]
    FailedToAcquireTokenSilently(String),
    #[error("User interaction is required for {0}")]
    UserInteractionRequired(String),
    #[error("Signed-in user has neither a upn nor an email claim")]
    MissingPrincipalName,
    #[error("Signed-in user has no bootstrap token to exchange")]
    MissingBootstrapToken,
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),
    #[error("Token refresh task aborted: {0}")]
    RefreshAborted(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AuthError {
    /// True for the two conditions that allow falling back from a silent
    /// lookup to an active on-behalf-of exchange.
    pub fn requires_interaction(&self) -> bool {
        matches!(
            self,
            AuthError::FailedToAcquireTokenSilently(_) | AuthError::UserInteractionRequired(_)
        )
    }

    /// OAuth error code returned by the token endpoint, if any.
    pub fn oauth_code(&self) -> Option<&str> {
        match self {
            AuthError::TokenEndpoint { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Non-success response from the reporting API.
#[derive(Debug)]
pub struct RemoteApiError {
    pub status: StatusCode,
    pub body: String,
    pub request_id: Option<String>,
}

impl fmt::Display for RemoteApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status: {} ({})\nResponse: {}\nRequestId: {}",
            self.status.canonical_reason().unwrap_or("Unknown"),
            self.status.as_u16(),
            self.body,
            self.request_id.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for RemoteApiError {}

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error(transparent)]
    RemoteApi(#[from] RemoteApiError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("No reports were found in the workspace")]
    NoReports,
    #[error("No report with the given ID was found in the workspace. Make sure ReportId is valid.")]
    ReportNotFound,
}

/// Every way building an embed configuration can fail. Rendered into
/// `EmbedConfig::error_message` at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("{0}")]
    Configuration(String),
    #[error("Could not acquire Super User Access Token")]
    ServiceToken(#[source] AuthError),
    #[error("Could not acquire downstream access token: {0}")]
    Auth(#[source] AuthError),
    #[error(transparent)]
    RemoteApi(RemoteApiError),
    #[error(transparent)]
    Transport(TransportError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("Report {0} is not backed by a dataset, so no effective identity can be applied")]
    MissingDataset(String),
    #[error("Failed to generate embed token.")]
    Integrity,
}

impl From<ReportingError> for EmbedError {
    fn from(err: ReportingError) -> Self {
        match err {
            ReportingError::RemoteApi(e) => EmbedError::RemoteApi(e),
            ReportingError::Transport(e) => EmbedError::Transport(e),
        }
    }
}
