mod config;
mod errors;
mod gateway;
mod refresh;
mod request;
pub(crate) mod telemetry;
mod token;

pub use config::{ConfigLocation, GatewayConfig, read_config};
pub use errors::{ApiRejection, Error};
pub use gateway::ApiGateway;
pub use request::{ApiRequest, ApiResponse};
pub use token::{CredentialStore, MemoryCredentialStore};
