use crate::error::AuthError;
use crate::http::HttpClient;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Grant type for the on-behalf-of user assertion.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// A successful token endpoint response.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    /// Expiry with the refresh margin already subtracted.
    pub fn expires_at(
        &self,
        issued_at: OffsetDateTime,
        margin: Duration,
    ) -> Result<OffsetDateTime, AuthError> {
        time::Duration::try_from(self.expires_in.saturating_sub(margin))
            .ok()
            .and_then(|lifetime| issued_at.checked_add(lifetime))
            .ok_or_else(|| AuthError::InvalidTokenResponse("expires_in out of range".into()))
    }
}

/// `expires_in` arrives as a number from most providers and as a numeric
/// string from the v1 endpoint.
#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(f64),
    Text(String),
}

impl Seconds {
    fn to_duration(&self) -> Option<Duration> {
        let secs = match self {
            Seconds::Number(n) => *n,
            Seconds::Text(s) => s.trim().parse().ok()?,
        };
        Duration::try_from_secs_f64(secs).ok()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Seconds>,
    refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// The identity provider's OAuth2 token endpoint.
#[derive(Clone)]
pub struct TokenEndpoint {
    http: HttpClient,
    url: Arc<str>,
}

impl TokenEndpoint {
    pub fn new(http: HttpClient, url: impl Into<Arc<str>>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs a token request. Non-success statuses become
    /// [`AuthError::TokenEndpoint`] carrying the OAuth error code.
    #[tracing::instrument(name = "token_request", skip(self, form), fields(url = %self.url, grant_type = tracing::field::Empty))]
    pub async fn request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AuthError> {
        if let Some((_, grant)) = form.iter().find(|(k, _)| *k == "grant_type") {
            tracing::Span::current().record("grant_type", *grant);
        }

        let response = self.http.post_form(&self.url, form).await?;
        if !response.status.is_success() {
            let detail: TokenErrorResponse = response.json().unwrap_or_default();
            tracing::warn!(
                status = %response.status,
                error = detail.error.as_deref().unwrap_or("unknown"),
                "Token endpoint rejected request"
            );
            return Err(AuthError::TokenEndpoint {
                status: response.status,
                code: detail.error,
                description: detail.error_description,
            });
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidTokenResponse("missing access_token".into()))?;
        let expires_in = body
            .expires_in
            .as_ref()
            .and_then(Seconds::to_duration)
            .ok_or_else(|| AuthError::InvalidTokenResponse("missing or invalid expires_in".into()))?;

        Ok(TokenGrant {
            access_token,
            expires_in,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}
