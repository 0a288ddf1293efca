#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jiff::Timestamp;

use erp_gateway::{ApiGateway, GatewayConfig, MemoryCredentialStore};

pub fn unsigned_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("{header}.{payload}.")
}

pub fn fresh_refresh_token() -> String {
    unsigned_jwt(Timestamp::now().as_second() + 3_600)
}

pub fn seeded_store(access: &str) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    store.set_tokens(access, fresh_refresh_token());
    store
}

pub fn gateway(server_uri: &str, store: Arc<MemoryCredentialStore>) -> ApiGateway {
    gateway_with_config(GatewayConfig::new(server_uri).with_timeout_ms(2_000), store)
}

pub fn gateway_with_config(config: GatewayConfig, store: Arc<MemoryCredentialStore>) -> ApiGateway {
    ApiGateway::new(config, store).expect("gateway construction")
}
