//! Gateway construction-time configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::errors::Error;

pub enum ConfigLocation {
    File(String),
    Env,
}

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug, serde::Deserialize)]
pub struct GatewayConfig {
    /// Base URL all request paths are joined onto. A bare host is
    /// upgraded to `https://` at gateway construction.
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bound on the refresh call itself; queued waiters are released no
    /// later than this. Falls back to `timeout_ms` when unset.
    #[serde(default)]
    pub refresh_timeout_ms: Option<u64>,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            refresh_timeout_ms: None,
            default_headers: HashMap::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_refresh_timeout_ms(mut self, refresh_timeout_ms: u64) -> Self {
        self.refresh_timeout_ms = Some(refresh_timeout_ms);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms.unwrap_or(self.timeout_ms))
    }
}

pub fn read_config(loc: ConfigLocation) -> Result<GatewayConfig, Error> {
    match loc {
        ConfigLocation::File(path) => {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config file '{path}': {e}")))?;
            Ok(serde_json::from_str(&contents)?)
        }
        ConfigLocation::Env => read_config_from_env(),
    }
}

fn read_config_from_env() -> Result<GatewayConfig, Error> {
    let base_url = std::env::var("ERP_GATEWAY_BASE_URL")
        .map_err(|_| Error::Config("Missing ERP_GATEWAY_BASE_URL env var".to_string()))?;
    let mut config = GatewayConfig::new(base_url);
    if let Ok(timeout) = std::env::var("ERP_GATEWAY_TIMEOUT_MS") {
        config.timeout_ms = timeout
            .parse()
            .map_err(|_| Error::Config("Invalid ERP_GATEWAY_TIMEOUT_MS env var".to_string()))?;
    }
    if let Ok(timeout) = std::env::var("ERP_GATEWAY_REFRESH_TIMEOUT_MS") {
        config.refresh_timeout_ms = Some(timeout.parse().map_err(|_| {
            Error::Config("Invalid ERP_GATEWAY_REFRESH_TIMEOUT_MS env var".to_string())
        })?);
    }
    Ok(config)
}
