//! Reconstructing fetched trees on the local filesystem.

use bytes::{Bytes, BytesMut};
use futures::{TryFutureExt, TryStreamExt};
use hive_core::identifier::is_valid_segment;
use hive_core::{
    ByteStream, CoreError, CoreResult, EntryStream, FetchedNode, NodeKind, OpContext, StoreError,
};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{Gateway, resolve_reference};

/// Suffix of the hidden file a copy streams into before it is renamed.
const PARTIAL_SUFFIX: &str = ".hive-partial";

/// Upper bound on the buffer reserved up front from a store-reported size.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// What a materialization wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeReport {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// A directory whose children are still being enumerated.
struct Frame {
    children: EntryStream<(String, FetchedNode)>,
    dest: PathBuf,
    /// Path relative to the destination root.
    rel: PathBuf,
}

impl Gateway {
    /// Writes the object behind `identifier` to `destination_root`.
    ///
    /// A file is written to `destination_root` itself. A directory is
    /// recreated there, children in enumeration order. The first failure
    /// aborts the call and carries the failing entry's relative path
    /// (see [`CoreError::entry_path`]). Entries written before the failure
    /// stay on disk; the file being copied is never left half written, and
    /// a file already at its place is left as it was. Materialize to a
    /// temporary root and rename it if all-or-nothing is needed.
    pub async fn materialize(
        &self,
        ctx: &OpContext,
        identifier: &str,
        destination_root: impl AsRef<Path>,
    ) -> CoreResult<MaterializeReport> {
        let path = resolve_reference(identifier)?;
        let dest = destination_root.as_ref();
        let root = ctx.run(self.store.fetch(ctx, &path)).await?;

        let mut report = MaterializeReport::default();
        match root {
            FetchedNode::File { content, .. } => {
                if let Some(parent) = dest.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| CoreError::destination(parent, e))?;
                }
                report.bytes = write_file(ctx, content, dest).await?;
                report.files = 1;
            }
            FetchedNode::Directory(children) => {
                materialize_dir(ctx, children, dest, &mut report).await?;
            }
            FetchedNode::Symlink { .. } => {
                return Err(CoreError::UnsupportedNodeKind {
                    kind: NodeKind::Symlink,
                });
            }
        }

        info!(
            %path,
            dest = %dest.display(),
            files = report.files,
            directories = report.directories,
            bytes = report.bytes,
            "materialized object"
        );
        Ok(report)
    }

    /// Reads a whole file object into memory.
    pub async fn download_file(&self, ctx: &OpContext, identifier: &str) -> CoreResult<Bytes> {
        let path = resolve_reference(identifier)?;
        match ctx.run(self.store.fetch(ctx, &path)).await? {
            FetchedNode::File { size, mut content } => {
                let capacity = size.unwrap_or_default().min(MAX_PREALLOC) as usize;
                let mut buf = BytesMut::with_capacity(capacity);
                while let Some(chunk) = ctx.run(next_chunk(&mut content)).await? {
                    buf.extend_from_slice(&chunk);
                }
                debug!(%path, bytes = buf.len(), "downloaded file");
                Ok(buf.freeze())
            }
            other => Err(CoreError::UnsupportedNodeKind { kind: other.kind() }),
        }
    }

    /// File content as text; invalid UTF-8 is replaced.
    pub async fn cat(&self, ctx: &OpContext, object_path: &str) -> CoreResult<String> {
        let bytes = self.download_file(ctx, object_path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Depth-first walk with an explicit stack, so deep trees cannot exhaust
/// the call stack.
async fn materialize_dir(
    ctx: &OpContext,
    children: EntryStream<(String, FetchedNode)>,
    dest: &Path,
    report: &mut MaterializeReport,
) -> CoreResult<()> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| CoreError::destination(dest, e))?;
    report.directories += 1;

    let mut stack = vec![Frame {
        children,
        dest: dest.to_path_buf(),
        rel: PathBuf::new(),
    }];

    while let Some(frame) = stack.last_mut() {
        ctx.check()?;
        let next = ctx
            .run(frame.children.try_next())
            .await
            .map_err(|e| with_dir(e, &frame.rel))?;
        let Some((name, node)) = next else {
            stack.pop();
            continue;
        };

        if !is_valid_segment(&name) {
            return Err(with_dir(
                CoreError::MalformedEntry(format!("unsafe entry name {name:?}")),
                &frame.rel,
            ));
        }
        let dest = frame.dest.join(&name);
        let rel = frame.rel.join(&name);

        match node {
            FetchedNode::File { content, .. } => {
                let bytes = write_file(ctx, content, &dest)
                    .await
                    .map_err(|e| e.at_entry(&rel))?;
                report.files += 1;
                report.bytes += bytes;
            }
            FetchedNode::Directory(children) => {
                tokio::fs::create_dir_all(&dest)
                    .await
                    .map_err(|e| CoreError::destination(&dest, e).at_entry(&rel))?;
                report.directories += 1;
                stack.push(Frame {
                    children,
                    dest,
                    rel,
                });
            }
            FetchedNode::Symlink { .. } => {
                return Err(CoreError::UnsupportedNodeKind {
                    kind: NodeKind::Symlink,
                }
                .at_entry(&rel));
            }
        }
    }
    Ok(())
}

/// Attaches a directory's relative path unless it is the root itself.
fn with_dir(err: CoreError, rel: &Path) -> CoreError {
    if rel.as_os_str().is_empty() {
        err
    } else {
        err.at_entry(rel)
    }
}

/// Streams `content` into a hidden sibling of `dest` and renames it into
/// place once complete, so a failed copy never touches a file already at
/// `dest`. The handle is closed on every path and the partial file removed.
async fn write_file(ctx: &OpContext, mut content: ByteStream, dest: &Path) -> CoreResult<u64> {
    let partial = partial_path(dest)?;
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| CoreError::destination(dest, e))?;
    let copied = copy_into(ctx, &mut content, &mut file, dest).await;
    drop(file);

    let renamed = match copied {
        Ok(bytes) => tokio::fs::rename(&partial, dest)
            .await
            .map(|()| bytes)
            .map_err(|e| CoreError::destination(dest, e)),
        Err(err) => Err(err),
    };
    if renamed.is_err() {
        match tokio::fs::remove_file(&partial).await {
            Ok(()) => debug!(dest = %dest.display(), "removed partial file"),
            Err(err) => warn!(dest = %dest.display(), "failed to remove partial file: {err}"),
        }
    }
    renamed
}

fn partial_path(dest: &Path) -> CoreResult<PathBuf> {
    let name = dest.file_name().ok_or_else(|| {
        CoreError::destination(
            dest,
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"),
        )
    })?;
    let mut partial = OsString::from(".");
    partial.push(name);
    partial.push(PARTIAL_SUFFIX);
    Ok(dest.with_file_name(partial))
}

async fn copy_into(
    ctx: &OpContext,
    content: &mut ByteStream,
    file: &mut tokio::fs::File,
    dest: &Path,
) -> CoreResult<u64> {
    let mut written = 0;
    while let Some(chunk) = ctx.run(next_chunk(content)).await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| CoreError::destination(dest, e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| CoreError::destination(dest, e))?;
    Ok(written)
}

fn next_chunk(
    content: &mut ByteStream,
) -> impl Future<Output = Result<Option<Bytes>, StoreError>> + '_ {
    content.try_next().map_err(StoreError::Io)
}
