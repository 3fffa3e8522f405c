//! Core types and traits of the Hive gateway.
//!
//! Hive manages the lifecycle of content-addressed objects held by a remote
//! storage node: ingest, pinning, deletion with garbage collection, and
//! materialization back onto the local filesystem.
//!
//! This crate holds the parts shared by every other crate:
//!
//! - Content identifiers and immutable paths (`identifier`)
//! - The cancellation and deadline context carried by each operation
//!   (`OpContext`)
//! - The error taxonomy (`CoreError`, `ErrorKind`)
//! - The narrow capability interface of a storage node (`RemoteStore`) and
//!   the data it exchanges (`node`, `pins`, `peer`, `upload`)
//!
//! Store implementations live in `hive_store_memory` and `hive_store_kubo`;
//! the operations themselves live in `hive_gateway`.

pub mod context;
pub mod error;
pub mod identifier;
pub mod node;
pub mod peer;
pub mod pins;
pub mod store;
pub mod upload;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

pub use cid::Cid;
pub use context::OpContext;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use identifier::{IdentifierError, ImmutablePath, Namespace, decode_cid, resolve_path};
pub use node::{DirEntry, FetchedNode, NodeKind};
pub use peer::{Direction, NodeInfo, PeerInfo, PingResult};
pub use pins::{PinKind, PinRecord, PinStatus};
pub use store::{
    ByteStream, EntryStream, GcReport, RemoteStore, StoreError, StoreResult, SubmitOptions,
};
pub use upload::UploadNode;
