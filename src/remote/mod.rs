use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;

pub mod connection;
pub mod store;

/// Source of bearer tokens for outgoing requests.
///
/// Implemented by the authentication collaborator; `None` sends the request
/// unauthenticated, relying on store-level security rules.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait TokenProvider: Send + Sync + 'static {
    async fn token(&self) -> StoreResult<Option<String>>;
}

#[derive(Default, Clone)]
pub struct NoopTokenProvider;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl TokenProvider for NoopTokenProvider {
    async fn token(&self) -> StoreResult<Option<String>> {
        Ok(None)
    }
}

pub type TokenProviderArc = Arc<dyn TokenProvider>;

pub use connection::{map_http_error, Connection};
pub use store::{RemoteStore, RemoteStoreConfig};
