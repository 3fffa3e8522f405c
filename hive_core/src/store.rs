use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures_core::Stream;

use crate::context::OpContext;
use crate::identifier::ImmutablePath;
use crate::node::{DirEntry, FetchedNode};
use crate::peer::{NodeInfo, PeerInfo, PingResult};
use crate::pins::{PinRecord, PinStatus};
use crate::upload::UploadNode;

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;

/// File content as a stream of chunks.
pub type ByteStream = Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>;

/// A single-pass enumeration produced by the remote store.
pub type EntryStream<T> = Box<dyn Stream<Item = StoreResult<T>> + Send + Unpin + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    /// An enumerated entry could not be decoded.
    #[error("malformed entry: {0}")]
    Malformed(String),
    #[error("cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Options for content submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub cid_version: cid::Version,
    /// Pin during submission. The core always submits unpinned and pins in
    /// a separate step.
    pub pin: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            cid_version: cid::Version::V1,
            pin: false,
        }
    }
}

/// Outcome of a store-wide collection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcReport {
    /// Objects removed by this pass.
    pub removed: Vec<Cid>,
}

/// Narrow capability interface of an already-connected content-addressed
/// storage node.
///
/// Every primitive is atomic on the store side; sequencing and validation
/// happen in the caller. Every call receives the operation context so
/// implementations can honour cancellation and deadlines themselves.
#[async_trait]
pub trait RemoteStore: std::fmt::Debug + Send + Sync + 'static {
    /// Stores a file or directory tree and returns its root identifier.
    /// Identical bytes always yield identical identifiers.
    async fn submit(
        &self,
        ctx: &OpContext,
        node: UploadNode,
        options: SubmitOptions,
    ) -> StoreResult<Cid>;

    /// Fetches a node: a byte stream for files, a lazily enumerated
    /// directory otherwise.
    async fn fetch(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<FetchedNode>;

    /// Adds a direct (recursive) pin under `name`.
    async fn pin_add(&self, ctx: &OpContext, path: &ImmutablePath, name: &str)
    -> StoreResult<()>;

    /// Removes the direct pin of `path`.
    async fn pin_remove(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<()>;

    async fn pin_status(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<PinStatus>;

    async fn pin_list(&self, ctx: &OpContext) -> StoreResult<EntryStream<PinRecord>>;

    async fn dir_list(
        &self,
        ctx: &OpContext,
        path: &ImmutablePath,
    ) -> StoreResult<EntryStream<DirEntry>>;

    /// Runs a garbage-collection pass over the whole store.
    async fn gc(&self, ctx: &OpContext) -> StoreResult<GcReport>;

    async fn node_info(&self, ctx: &OpContext, peer_id: &str) -> StoreResult<NodeInfo>;

    async fn ping(&self, ctx: &OpContext, peer_id: &str) -> StoreResult<EntryStream<PingResult>>;

    async fn connected_peers(&self, ctx: &OpContext) -> StoreResult<Vec<PeerInfo>>;
}
