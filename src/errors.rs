use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Normalized rejection shape; the only error contract the UI layer may
/// branch on.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRejection {
    pub status: u16,
    pub message: String,
    pub data: Value,
}

impl ApiRejection {
    /// Shapes a non-2xx response body into `{status, message, data}`.
    ///
    /// The message is picked in priority order from `data.message`,
    /// `data.error`, `data.detail`, the raw body, then a generic fallback.
    pub fn from_body(status: u16, body: &str) -> Self {
        let data = match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(_) if body.trim().is_empty() => Value::Null,
            Err(_) => Value::String(body.to_string()),
        };
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| data.get("error").and_then(Value::as_str))
            .or_else(|| data.get("detail").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| {
                let raw = body.trim();
                if raw.is_empty() {
                    format!("Request failed with status {status}")
                } else {
                    raw.to_string()
                }
            });
        Self {
            status,
            message,
            data,
        }
    }
}

impl fmt::Display for ApiRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

#[derive(Debug)]
pub enum Error {
    /// Non-2xx response with a normalized body.
    Api(ApiRejection),
    /// Re-login required: refresh token absent, expired, or unusable.
    /// Carries the original 401 rejection; the UI owns the redirect.
    SessionExpired(ApiRejection),
    Timeout(Duration),
    Network(String),
    Config(String),
    Json(serde_json::Error),
    Http(reqwest::Error),
}

impl Error {
    /// The `{status, message, data}` view of this error. Timeouts map to
    /// status 408, connectivity failures and everything pre-wire to 0.
    pub fn rejection(&self) -> ApiRejection {
        match self {
            Error::Api(rejection) | Error::SessionExpired(rejection) => rejection.clone(),
            Error::Timeout(limit) => ApiRejection {
                status: 408,
                message: format!("Request timed out after {limit:?}"),
                data: Value::Null,
            },
            Error::Network(message) => ApiRejection {
                status: 0,
                message: message.clone(),
                data: Value::Null,
            },
            Error::Config(message) => ApiRejection {
                status: 0,
                message: message.clone(),
                data: Value::Null,
            },
            Error::Json(err) => ApiRejection {
                status: 0,
                message: err.to_string(),
                data: Value::Null,
            },
            Error::Http(err) => ApiRejection {
                status: 0,
                message: err.to_string(),
                data: Value::Null,
            },
        }
    }

    pub fn status(&self) -> u16 {
        self.rejection().status
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api(rejection) => write!(f, "API error {rejection}"),
            Error::SessionExpired(rejection) => write!(f, "session expired ({rejection})"),
            Error::Timeout(limit) => write!(f, "Request timed out after {limit:?}"),
            Error::Network(message) => write!(f, "network error: {message}"),
            Error::Config(message) => write!(f, "configuration error: {message}"),
            Error::Json(err) => write!(f, "JSON error: {err}"),
            Error::Http(err) => write!(f, "HTTP client error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            Error::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}
