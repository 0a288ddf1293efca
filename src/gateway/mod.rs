use std::sync::Arc;

use reqwest::Client;

use crate::config::GatewayConfig;
use crate::refresh::RefreshCoordinator;
use crate::token::CredentialStore;

mod impls;

/// Authenticated HTTP client gateway: the sole entry point for the
/// console's data fetches and mutations. Attaches bearer tokens from the
/// credential store, recovers 401s through a single-flight token refresh,
/// and normalizes every failure into `{status, message, data}`.
///
/// Cloning is cheap; clones share the credential store and the refresh
/// state. Separately constructed gateways share nothing.
#[derive(Clone)]
pub struct ApiGateway {
    http: Client,
    base_url: String,
    config: GatewayConfig,
    store: Arc<dyn CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
