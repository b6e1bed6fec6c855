//! On-behalf-of exchange of the signed-in user's bootstrap token for a token
//! scoped to the downstream data resource.

use crate::error::AuthError;
use crate::identity::UserIdentity;
use crate::tokens::endpoint::{JWT_BEARER_GRANT, TokenEndpoint, TokenGrant};
use crate::tokens::user_cache::{CachedUserToken, UserTokenCache, UserTokenKey};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct DownstreamAccessToken {
    value: String,
}

impl DownstreamAccessToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Debug for DownstreamAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DownstreamAccessToken(<redacted>)")
    }
}

/// Credentials of the confidential client doing the exchange.
#[derive(Clone)]
pub struct ConfidentialClient {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone)]
pub struct OnBehalfOfExchanger {
    endpoint: TokenEndpoint,
    client: Arc<ConfidentialClient>,
    resource: Arc<str>,
    cache: UserTokenCache,
    margin: Duration,
}

impl OnBehalfOfExchanger {
    pub fn new(
        endpoint: TokenEndpoint,
        client: ConfidentialClient,
        resource: impl Into<Arc<str>>,
        margin: Duration,
    ) -> Self {
        Self {
            endpoint,
            client: Arc::new(client),
            resource: resource.into(),
            cache: UserTokenCache::default(),
            margin,
        }
    }

    pub fn cache(&self) -> &UserTokenCache {
        &self.cache
    }

    /// Silent lookup first; an active assertion exchange only when the silent
    /// attempt reports that no usable token exists.
    #[tracing::instrument(name = "exchange_for_downstream_token", skip(self, identity), fields(principal = identity.principal_name(), resource = %self.resource))]
    pub async fn exchange_for_downstream_token(
        &self,
        identity: &UserIdentity,
    ) -> Result<DownstreamAccessToken, AuthError> {
        let principal = identity
            .principal_name()
            .ok_or(AuthError::MissingPrincipalName)?;
        let assertion = identity
            .bootstrap_token()
            .ok_or(AuthError::MissingBootstrapToken)?;
        let key = UserTokenKey::new(&self.resource, &self.client.client_id, principal);

        match self.acquire_silent(&key, assertion).await {
            Ok(token) => Ok(token),
            Err(e) if e.requires_interaction() => {
                tracing::debug!(reason = %e, "Silent acquisition failed, exchanging user assertion");
                self.acquire_with_assertion(key, assertion).await
            }
            Err(e) => Err(e),
        }
    }

    async fn acquire_silent(
        &self,
        key: &UserTokenKey,
        assertion: &str,
    ) -> Result<DownstreamAccessToken, AuthError> {
        let cached = self
            .cache
            .get(key)
            .filter(|cached| cached.matches_assertion(assertion))
            .ok_or_else(|| AuthError::FailedToAcquireTokenSilently(key.principal.clone()))?;
        if !cached.is_expired() {
            tracing::debug!("Downstream token served from cache");
            return Ok(DownstreamAccessToken {
                value: cached.access_token,
            });
        }

        let refresh_token = cached
            .redeemable_refresh_token()
            .ok_or_else(|| AuthError::FailedToAcquireTokenSilently(key.principal.clone()))?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("resource", &*self.resource),
        ];
        match self.endpoint.request(&form).await {
            Ok(grant) => self.store(key.clone(), grant, assertion),
            Err(e) if matches!(e.oauth_code(), Some("invalid_grant" | "interaction_required")) => {
                self.cache.invalidate(key);
                Err(AuthError::UserInteractionRequired(key.principal.clone()))
            }
            Err(e) => Err(e),
        }
    }

    async fn acquire_with_assertion(
        &self,
        key: UserTokenKey,
        assertion: &str,
    ) -> Result<DownstreamAccessToken, AuthError> {
        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion),
            ("requested_token_use", "on_behalf_of"),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("resource", &*self.resource),
            ("scope", "openid"),
        ];
        let grant = self.endpoint.request(&form).await?;
        self.store(key, grant, assertion)
    }

    fn store(
        &self,
        key: UserTokenKey,
        grant: TokenGrant,
        assertion: &str,
    ) -> Result<DownstreamAccessToken, AuthError> {
        let expires_at = grant.expires_at(OffsetDateTime::now_utc(), self.margin)?;
        self.cache.insert(
            key,
            CachedUserToken::new(
                grant.access_token.clone(),
                expires_at,
                grant.refresh_token,
                assertion,
            ),
        );
        Ok(DownstreamAccessToken {
            value: grant.access_token,
        })
    }
}
