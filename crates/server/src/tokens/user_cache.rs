use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

/// Identifies a cached on-behalf-of result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserTokenKey {
    pub resource: String,
    pub client_id: String,
    /// Lowercased principal name.
    pub principal: String,
}

impl UserTokenKey {
    pub fn new(resource: &str, client_id: &str, principal: &str) -> Self {
        Self {
            resource: resource.to_string(),
            client_id: client_id.to_string(),
            principal: principal.to_lowercase(),
        }
    }
}

/// SHA-256 of the bootstrap token a cached result was obtained with.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AssertionFingerprint([u8; 32]);

impl AssertionFingerprint {
    pub fn of(assertion: &str) -> Self {
        Self(Sha256::digest(assertion.as_bytes()).into())
    }
}

impl fmt::Debug for AssertionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AssertionFingerprint(..)")
    }
}

/// Upper bound on how long an entry's refresh token is considered redeemable.
pub const REFRESH_TOKEN_LIFETIME: time::Duration = time::Duration::days(90);

#[derive(Clone)]
pub struct CachedUserToken {
    pub access_token: String,
    /// Margin-adjusted expiry of `access_token`.
    pub expires_at: OffsetDateTime,
    pub refresh_token: Option<String>,
    /// Only a request presenting the same bootstrap token may reuse the entry.
    pub assertion: AssertionFingerprint,
    pub issued_at: OffsetDateTime,
}

impl CachedUserToken {
    pub fn new(
        access_token: String,
        expires_at: OffsetDateTime,
        refresh_token: Option<String>,
        assertion: &str,
    ) -> Self {
        Self {
            access_token,
            expires_at,
            refresh_token,
            assertion: AssertionFingerprint::of(assertion),
            issued_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    pub fn matches_assertion(&self, assertion: &str) -> bool {
        self.assertion == AssertionFingerprint::of(assertion)
    }

    /// Refresh token, unless it is past [`REFRESH_TOKEN_LIFETIME`].
    pub fn redeemable_refresh_token(&self) -> Option<&str> {
        let stale = OffsetDateTime::now_utc() - self.issued_at > REFRESH_TOKEN_LIFETIME;
        self.refresh_token.as_deref().filter(|_| !stale)
    }

    /// Expired and nothing left to redeem.
    fn is_dead(&self) -> bool {
        self.is_expired() && self.redeemable_refresh_token().is_none()
    }
}

/// In-memory token cache backing the silent lookup. Lives for the lifetime
/// of the process; nothing is persisted.
#[derive(Clone)]
pub struct UserTokenCache {
    entries: Arc<DashMap<UserTokenKey, CachedUserToken>>,
    last_cleanup: Arc<std::sync::Mutex<OffsetDateTime>>,
}

impl Default for UserTokenCache {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            last_cleanup: Arc::new(std::sync::Mutex::new(OffsetDateTime::now_utc())),
        }
    }
}

impl UserTokenCache {
    /// Drop dead entries if enough time has passed
    fn maybe_cleanup(&self) {
        const CLEANUP_INTERVAL: time::Duration = time::Duration::minutes(5);

        if let Ok(mut last_cleanup) = self.last_cleanup.try_lock() {
            let now = OffsetDateTime::now_utc();
            if now - *last_cleanup >= CLEANUP_INTERVAL {
                *last_cleanup = now;
                drop(last_cleanup);

                self.entries.retain(|_, entry| !entry.is_dead());
            }
        }
    }

    pub fn get(&self, key: &UserTokenKey) -> Option<CachedUserToken> {
        self.maybe_cleanup();
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: UserTokenKey, token: CachedUserToken) {
        self.maybe_cleanup();
        self.entries.insert(key, token);
    }

    pub fn invalidate(&self, key: &UserTokenKey) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
