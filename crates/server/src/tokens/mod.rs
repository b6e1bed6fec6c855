//! Token acquisition against the identity provider.
//!
//! - `service` - cached bearer token for the reporting service account
//! - `exchange` - on-behalf-of exchange for the downstream data resource
//! - `endpoint` - the shared token endpoint client

pub mod endpoint;
pub mod exchange;
pub mod service;
mod user_cache;

pub use endpoint::{TokenEndpoint, TokenGrant};
pub use exchange::{ConfidentialClient, DownstreamAccessToken, OnBehalfOfExchanger};
pub use service::{ServiceToken, ServiceTokenCache, ServiceTokenRequest};
pub use user_cache::{
    AssertionFingerprint, CachedUserToken, REFRESH_TOKEN_LIFETIME, UserTokenCache, UserTokenKey,
};
