use cid::Cid;
use hive_core::{CoreError, CoreResult, ImmutablePath, OpContext, SubmitOptions, UploadNode};
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::Gateway;

/// Result of a successful `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedObject {
    pub path: ImmutablePath,
    pub root: Cid,
}

impl Gateway {
    /// Uploads a local file or directory and pins its root under `name`.
    ///
    /// Content is submitted unpinned and pinned in a second call, so a pin
    /// failure is reported as [`CoreError::PinFailed`] while the content
    /// stays in the store, unpinned and eligible for collection.
    ///
    /// Adding identical bytes again returns the same root and records an
    /// additional pin under the new name.
    pub async fn add(
        &self,
        ctx: &OpContext,
        name: &str,
        local_path: impl AsRef<Path>,
    ) -> CoreResult<AddedObject> {
        let local_path = local_path.as_ref();
        if name.is_empty() {
            return Err(CoreError::InvalidInput("name must not be empty".into()));
        }
        if local_path.as_os_str().is_empty() {
            return Err(CoreError::InvalidInput("local path must not be empty".into()));
        }
        ctx.check()?;

        tokio::fs::metadata(local_path)
            .await
            .map_err(|e| local_error(local_path, e))?;
        let node = ctx
            .run(wrap_local(local_path, self.include_hidden))
            .await?;
        debug!(
            path = %local_path.display(),
            kind = %node.kind(),
            size = node.total_size(),
            "submitting local content"
        );

        let root = ctx
            .run(self.store.submit(ctx, node, SubmitOptions::default()))
            .await?;
        let path = ImmutablePath::from_cid(root);

        ctx.run(self.store.pin_add(ctx, &path, name))
            .await
            .map_err(|source| CoreError::PinFailed {
                root,
                name: name.to_owned(),
                source: Box::new(source),
            })?;

        info!(%path, name, "added object");
        Ok(AddedObject { path, root })
    }
}

/// Walks the local tree on the blocking pool.
async fn wrap_local(path: &Path, include_hidden: bool) -> CoreResult<UploadNode> {
    let root = path.to_path_buf();
    tokio::task::spawn_blocking(move || UploadNode::from_path(&root, include_hidden))
        .await
        .map_err(io::Error::other)
        .and_then(|walked| walked)
        .map_err(|e| local_error(path, e))
}

fn local_error(path: &Path, err: io::Error) -> CoreError {
    CoreError::NotFound(format!("{}: {err}", path.display()))
}
