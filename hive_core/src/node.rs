use cid::Cid;
use std::fmt;

use crate::store::{ByteStream, EntryStream};

/// Kind of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
            NodeKind::Symlink => "symlink",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One link of a directory listing, in whatever order the store yields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub cid: Cid,
    /// Size in bytes (for symlinks, the length of the target).
    pub size: u64,
    pub kind: NodeKind,
}

/// A fetched node, held only for the duration of one materialization.
///
/// Directory children are produced lazily and can be enumerated once.
pub enum FetchedNode {
    File {
        /// Size announced by the store, if known up front.
        size: Option<u64>,
        content: ByteStream,
    },
    Directory(EntryStream<(String, FetchedNode)>),
    Symlink {
        target: String,
    },
}

impl FetchedNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            FetchedNode::File { .. } => NodeKind::File,
            FetchedNode::Directory(_) => NodeKind::Directory,
            FetchedNode::Symlink { .. } => NodeKind::Symlink,
        }
    }
}

impl fmt::Debug for FetchedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchedNode::File { size, .. } => {
                f.debug_struct("File").field("size", size).finish_non_exhaustive()
            }
            FetchedNode::Directory(_) => f.debug_tuple("Directory").finish_non_exhaustive(),
            FetchedNode::Symlink { target } => {
                f.debug_struct("Symlink").field("target", target).finish()
            }
        }
    }
}
