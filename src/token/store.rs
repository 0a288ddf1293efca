use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jiff::Timestamp;

use super::claims;

/// Supplies and persists the credential pair. The gateway never stores
/// tokens itself; persistence policy (durable vs. session-scoped) belongs
/// to the implementor.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    /// Expiry check for the refresh token. A store backed by JWTs reads
    /// the `exp` claim; opaque-token stores may defer to the server by
    /// returning true whenever a token is present.
    fn has_valid_refresh_token(&self) -> bool;
    fn update_access_token(&self, token: String);
    fn clear_auth(&self);
}

#[derive(Clone, Debug)]
struct CredentialPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// In-process credential store. Expiry is judged by decoding the refresh
/// token's `exp` claim with a configurable leeway.
pub struct MemoryCredentialStore {
    pair: RwLock<CredentialPair>,
    leeway: Duration,
    clear_calls: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_leeway(Duration::from_secs(30))
    }

    pub fn with_leeway(leeway: Duration) -> Self {
        Self {
            pair: RwLock::new(CredentialPair {
                access_token: None,
                refresh_token: None,
            }),
            leeway,
            clear_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let mut pair = self.pair.write().unwrap_or_else(|e| e.into_inner());
        pair.access_token = Some(access_token.into());
        pair.refresh_token = Some(refresh_token.into());
    }

    /// Number of times `clear_auth` has run; lets tests assert clearing
    /// happens exactly once.
    pub fn clear_auth_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.pair
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .access_token
            .clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.pair
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .refresh_token
            .clone()
    }

    fn has_valid_refresh_token(&self) -> bool {
        let cutoff = Timestamp::now().as_second() + self.leeway.as_secs() as i64;
        match self.refresh_token() {
            Some(token) => claims::expires_after(&token, cutoff),
            None => false,
        }
    }

    fn update_access_token(&self, token: String) {
        let mut pair = self.pair.write().unwrap_or_else(|e| e.into_inner());
        pair.access_token = Some(token);
    }

    fn clear_auth(&self) {
        let mut pair = self.pair.write().unwrap_or_else(|e| e.into_inner());
        pair.access_token = None;
        pair.refresh_token = None;
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
    }
}
