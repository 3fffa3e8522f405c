//! Content-object lifecycle operations on top of a `RemoteStore`.
//!
//! [`Gateway`] is the single entry point. Each operation validates its
//! input, then sequences one or more remote calls, every one of them raced
//! against the caller's [`OpContext`]. The gateway holds no mutable state;
//! consistency between concurrent operations is left to the store.

use hive_core::{CoreError, CoreResult, ImmutablePath, RemoteStore, StoreResult, resolve_path};
use std::sync::Arc;

pub mod config;
mod delete;
mod ingest;
mod listing;
mod materialize;
mod pinning;

pub use config::{GatewaySettings, HiveConfig, StoreConfig};
pub use ingest::AddedObject;
pub use materialize::MaterializeReport;

use hive_store_kubo::KuboStore;
use hive_store_memory::MemoryStore;

/// Builds the store described by `config`.
pub async fn create_store(config: StoreConfig) -> StoreResult<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match config {
        StoreConfig::Kubo(config) => Arc::new(KuboStore::create(config)?),
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Cheap to clone; clones share the store.
#[derive(Debug, Clone)]
pub struct Gateway {
    store: Arc<dyn RemoteStore>,
    include_hidden: bool,
}

impl Gateway {
    pub fn new(store: impl RemoteStore) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            include_hidden: false,
        }
    }

    /// Includes dot-files when wrapping local directories for `add`.
    pub fn with_hidden_files(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }
}

/// Resolves a caller-supplied reference: an immutable path
/// (`/ipfs/<cid>[/...]`) or a bare content identifier.
pub fn resolve_reference(reference: &str) -> CoreResult<ImmutablePath> {
    if reference.is_empty() {
        return Err(CoreError::InvalidInput("object path must not be empty".into()));
    }
    if reference.starts_with('/') {
        ImmutablePath::parse(reference).map_err(|e| CoreError::invalid_path(reference, e))
    } else {
        resolve_path(reference).map_err(|e| CoreError::invalid_identifier(reference, e))
    }
}
