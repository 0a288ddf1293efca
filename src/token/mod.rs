pub(crate) mod claims;
mod store;

pub use store::{CredentialStore, MemoryCredentialStore};
