//! Process-wide bearer token for the reporting service account.

use crate::config::ServiceCredentials;
use crate::error::AuthError;
use crate::tokens::endpoint::TokenEndpoint;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A service-account access token. `expires_at` already has the refresh
/// margin subtracted.
#[derive(Clone)]
pub struct ServiceToken {
    value: String,
    expires_at: OffsetDateTime,
}

impl ServiceToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}

impl fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What to ask the token endpoint for on every refresh.
#[derive(Clone)]
pub struct ServiceTokenRequest {
    pub resource: String,
    pub application_id: String,
    pub credentials: ServiceCredentials,
}

impl ServiceTokenRequest {
    fn form(&self) -> Vec<(&str, &str)> {
        let mut form = vec![
            ("resource", self.resource.as_str()),
            ("client_id", self.application_id.as_str()),
        ];
        match &self.credentials {
            ServiceCredentials::Password { username, password } => {
                form.push(("grant_type", "password"));
                form.push(("username", username.as_str()));
                form.push(("password", password.as_str()));
                form.push(("scope", "openid"));
            }
            ServiceCredentials::ClientSecret(secret) => {
                form.push(("grant_type", "client_credentials"));
                form.push(("client_secret", secret.as_str()));
            }
        }
        form
    }
}

/// Caches the service token and refreshes it ahead of expiry.
///
/// Created once at startup and shared by reference (clones share state).
/// Callers queue on a single async mutex, so at most one refresh is in flight
/// and every waiter sees either the previous token or the refreshed one.
#[derive(Clone)]
pub struct ServiceTokenCache {
    slot: Arc<Mutex<Option<ServiceToken>>>,
    endpoint: TokenEndpoint,
    request: Arc<ServiceTokenRequest>,
    margin: Duration,
}

impl ServiceTokenCache {
    pub fn new(endpoint: TokenEndpoint, request: ServiceTokenRequest, margin: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            endpoint,
            request: Arc::new(request),
            margin,
        }
    }

    /// Returns the cached token, refreshing it first when absent or expired.
    ///
    /// The refresh runs on its own task that owns the lock guard: dropping
    /// this future does not abort a refresh other callers are waiting on.
    #[tracing::instrument(name = "get_service_token", skip(self))]
    pub async fn get_service_token(&self) -> Result<ServiceToken, AuthError> {
        let guard = self.slot.clone().lock_owned().await;
        if let Some(token) = guard.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.clone());
        }

        let this = self.clone();
        tokio::spawn(async move { this.refresh(guard).await })
            .await
            .map_err(|e| AuthError::RefreshAborted(e.to_string()))?
    }

    /// Last token stored, expired or not.
    pub async fn cached(&self) -> Option<ServiceToken> {
        self.slot.lock().await.clone()
    }

    async fn refresh(
        &self,
        mut slot: OwnedMutexGuard<Option<ServiceToken>>,
    ) -> Result<ServiceToken, AuthError> {
        tracing::debug!(
            resource = %self.request.resource,
            "Service token absent or expired, requesting a new one"
        );
        let issued_at = OffsetDateTime::now_utc();
        // On failure the guard drops here and the cached value stays as it was.
        let grant = self.endpoint.request(&self.request.form()).await?;

        let token = ServiceToken {
            expires_at: grant.expires_at(issued_at, self.margin)?,
            value: grant.access_token,
        };
        *slot = Some(token.clone());
        tracing::info!(expires_at = %token.expires_at, "Service token refreshed");
        Ok(token)
    }
}
