//! The signed-in user, as handed to the token exchanger.

use crate::config::{ConfigError, InboundAuthConfig};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use std::fmt;

/// Claims and bootstrap token of the user making the request.
///
/// Built by the HTTP adapters and never stored beyond the request.
#[derive(Clone, Default)]
pub struct UserIdentity {
    upn: Option<String>,
    email: Option<String>,
    bootstrap_token: Option<String>,
}

impl UserIdentity {
    pub fn new(
        upn: Option<String>,
        email: Option<String>,
        bootstrap_token: Option<String>,
    ) -> Self {
        Self {
            upn: upn.filter(|v| !v.trim().is_empty()),
            email: email.filter(|v| !v.trim().is_empty()),
            bootstrap_token: bootstrap_token.filter(|v| !v.trim().is_empty()),
        }
    }

    /// UPN claim, falling back to the email claim.
    pub fn principal_name(&self) -> Option<&str> {
        self.upn.as_deref().or(self.email.as_deref())
    }

    pub fn bootstrap_token(&self) -> Option<&str> {
        self.bootstrap_token.as_deref()
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("principal_name", &self.principal_name())
            .field("has_bootstrap_token", &self.bootstrap_token.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    #[serde(default)]
    upn: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Turns an inbound bearer JWT into a [`UserIdentity`] whose bootstrap token
/// is that same JWT.
#[derive(Clone)]
pub struct InboundTokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl InboundTokenValidator {
    /// RS256 verification against `public_key_pem`. Without a key the
    /// validator is only built when `allow_unverified_tokens` is set.
    pub fn from_config(config: &InboundAuthConfig) -> Result<Self, ConfigError> {
        let pem = config
            .public_key_pem
            .as_deref()
            .map(str::trim)
            .filter(|pem| !pem.is_empty());
        let (key, mut validation) = match pem {
            Some(pem) => (
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                    ConfigError::Validation(format!("inbound.public_key_pem is not a valid RSA key: {e}"))
                })?,
                Validation::new(Algorithm::RS256),
            ),
            None if config.allow_unverified_tokens => {
                tracing::warn!(
                    "inbound.allow_unverified_tokens is set; bearer token signatures are not checked"
                );
                let mut validation = Validation::default();
                validation.insecure_disable_signature_validation();
                (DecodingKey::from_secret(&[]), validation)
            }
            None => {
                return Err(ConfigError::Validation(
                    "inbound.public_key_pem is required to verify bearer tokens".into(),
                ));
            }
        };

        match config.audience.as_deref() {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = config.issuer.as_deref() {
            validation.set_issuer(&[iss]);
        }

        Ok(Self { key, validation })
    }

    pub fn identify(&self, token: &str) -> Result<UserIdentity, jsonwebtoken::errors::Error> {
        let data = decode::<IdentityClaims>(token, &self.key, &self.validation)?;
        Ok(UserIdentity::new(
            data.claims.upn,
            data.claims.email,
            Some(token.to_string()),
        ))
    }
}
