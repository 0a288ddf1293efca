use std::sync::Arc;
use std::time::SystemTime;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::errors::{ApiRejection, Error};
use crate::refresh::{FlightRole, RefreshCoordinator, RefreshOutcome};
use crate::request::{ApiRequest, ApiResponse};
use crate::telemetry::refresh::RefreshTelemetry;
use crate::token::CredentialStore;

use super::ApiGateway;

/// Paths that must never trigger refresh-on-401.
const EXEMPT_PATHS: [&str; 3] = ["/auth/login", "/auth/register", "/auth/token/refresh"];
const REFRESH_PATH: &str = "/auth/token/refresh/";

impl ApiGateway {
    pub fn new(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        let base_url = if config.base_url.starts_with("http") {
            config.base_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.base_url.trim_end_matches('/'))
        };
        // Validate the base URL before any network calls happen.
        let _ = reqwest::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{base_url}': {e}")))?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid default header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid default header value: {e}")))?;
            default_headers.insert(name, value);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            http,
            base_url,
            config,
            store,
            refresh: Arc::new(RefreshCoordinator::new()),
        })
    }

    /// Issues a request with transparent 401 recovery. Every error comes
    /// back normalized; see [`Error::rejection`].
    pub async fn request(&self, req: ApiRequest) -> Result<ApiResponse, Error> {
        match self.dispatch(&req).await {
            Err(Error::Api(rejection))
                if rejection.status == 401 && !req.retried && !Self::is_exempt(&req.path) =>
            {
                self.recover_unauthorized(req, rejection).await
            }
            other => other,
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, Error> {
        self.request(ApiRequest::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, Error> {
        self.request(ApiRequest::put(path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse, Error> {
        self.request(ApiRequest::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.request(ApiRequest::delete(path)).await
    }

    fn is_exempt(path: &str) -> bool {
        EXEMPT_PATHS.iter().any(|exempt| path.contains(exempt))
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Sends one request: default headers from the client, per-request
    /// headers, then the bearer token when the store has one. A missing
    /// token never fails here; the request goes out unauthenticated and
    /// the server decides.
    async fn dispatch(&self, req: &ApiRequest) -> Result<ApiResponse, Error> {
        let url = self.url_for(&req.path);
        let mut builder = self.http.request(req.method.clone(), &url);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = self.store.access_token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        debug!(method = %req.method, path = %req.path, retried = req.retried, "gateway.dispatch");
        let resp = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status.is_success() {
            let headers = resp.headers().clone();
            let body = resp
                .bytes()
                .await
                .map_err(|e| self.transport_error(e))?
                .to_vec();
            return Ok(ApiResponse::new(status.as_u16(), headers, body));
        }

        let body = resp.text().await.unwrap_or_default();
        let rejection = ApiRejection::from_body(status.as_u16(), &body);
        warn!(
            status = rejection.status,
            path = %req.path,
            message = %rejection.message,
            "gateway.rejected"
        );
        Err(Error::Api(rejection))
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        Self::transport_error_with_limit(err, self.config.timeout())
    }

    fn transport_error_with_limit(err: reqwest::Error, limit: std::time::Duration) -> Error {
        if err.is_timeout() {
            Error::Timeout(limit)
        } else {
            Error::Network(err.to_string())
        }
    }

    /// 401 recovery: join the refresh flight (leading it if nobody else
    /// is), then re-issue the original request once with the new token,
    /// or map the settled failure.
    async fn recover_unauthorized(
        &self,
        mut req: ApiRequest,
        original: ApiRejection,
    ) -> Result<ApiResponse, Error> {
        req.retried = true;
        let outcome = match RefreshCoordinator::join(&self.refresh) {
            FlightRole::Waiter(rx) => {
                debug!(path = %req.path, "gateway.refresh.waiting");
                rx.await.unwrap_or_else(|_| {
                    RefreshOutcome::Failed(ApiRejection {
                        status: 0,
                        message: "token refresh aborted".to_string(),
                        data: Value::Null,
                    })
                })
            }
            FlightRole::Leader(guard) => {
                let telemetry = RefreshTelemetry::new("gateway.refresh");
                let outcome = self.run_refresh(&telemetry).await;
                guard.settle(outcome.clone());
                outcome
            }
        };

        match outcome {
            // The store already holds the new token; dispatch reattaches it.
            RefreshOutcome::Token(_) => self.dispatch(&req).await,
            RefreshOutcome::SessionExpired => Err(Error::SessionExpired(original)),
            RefreshOutcome::Failed(rejection) => Err(Error::Api(rejection)),
        }
    }

    /// One refresh attempt against the backend, bypassing the interceptor
    /// so a 401 from the refresh endpoint cannot recurse. All credential
    /// clearing for this flight happens here.
    async fn run_refresh(&self, telemetry: &RefreshTelemetry) -> RefreshOutcome {
        telemetry.emit_start(SystemTime::now());

        let Some(refresh_token) = self.store.refresh_token() else {
            info!("gateway.refresh.no_token");
            telemetry.emit_failure("no refresh token available", SystemTime::now());
            self.store.clear_auth();
            return RefreshOutcome::SessionExpired;
        };
        if !self.store.has_valid_refresh_token() {
            info!("gateway.refresh.token_expired");
            telemetry.emit_failure("refresh token expired", SystemTime::now());
            self.store.clear_auth();
            return RefreshOutcome::SessionExpired;
        }

        let url = self.url_for(REFRESH_PATH);
        let result = self
            .http
            .post(&url)
            .timeout(self.config.refresh_timeout())
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await;
        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                let error = Self::transport_error_with_limit(err, self.config.refresh_timeout());
                telemetry.emit_failure(&error.to_string(), SystemTime::now());
                self.store.clear_auth();
                return RefreshOutcome::Failed(error.rejection());
            }
        };

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let rejection = ApiRejection::from_body(status.as_u16(), &body);
            telemetry.emit_failure(&rejection.message, SystemTime::now());
            self.store.clear_auth();
            return RefreshOutcome::Failed(rejection);
        }

        let data: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        // Either key is accepted on the wire.
        let access = data
            .get("access")
            .and_then(Value::as_str)
            .or_else(|| data.get("accessToken").and_then(Value::as_str));
        match access {
            Some(token) => {
                self.store.update_access_token(token.to_string());
                telemetry.emit_success(SystemTime::now());
                info!("gateway.refresh.ok");
                RefreshOutcome::Token(token.to_string())
            }
            None => {
                let rejection = ApiRejection {
                    status: status.as_u16(),
                    message: "refresh response missing access token".to_string(),
                    data,
                };
                telemetry.emit_failure(&rejection.message, SystemTime::now());
                self.store.clear_auth();
                RefreshOutcome::Failed(rejection)
            }
        }
    }
}
