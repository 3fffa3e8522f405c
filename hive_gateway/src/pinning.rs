use hive_core::{CoreError, CoreResult, ImmutablePath, OpContext, PinKind, PinStatus};
use tracing::{debug, info};

use crate::{Gateway, resolve_reference};

impl Gateway {
    /// Adds a direct pin on `object_path` under `name`.
    pub async fn pin(&self, ctx: &OpContext, name: &str, object_path: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::InvalidInput("name must not be empty".into()));
        }
        let path = resolve_reference(object_path)?;
        ctx.run(self.store.pin_add(ctx, &path, name)).await?;
        info!(%path, name, "pinned object");
        Ok(())
    }

    /// Removes the direct pin on `object_path`.
    ///
    /// Refuses with [`CoreError::NotPinned`] or [`CoreError::IndirectlyPinned`]
    /// instead of touching the store when the object has no direct pin.
    pub async fn unpin(&self, ctx: &OpContext, object_path: &str) -> CoreResult<()> {
        let path = resolve_reference(object_path)?;
        self.unpin_resolved(ctx, &path).await
    }

    pub async fn pin_status(&self, ctx: &OpContext, object_path: &str) -> CoreResult<PinStatus> {
        let path = resolve_reference(object_path)?;
        ctx.run(self.store.pin_status(ctx, &path)).await
    }

    pub(crate) async fn unpin_resolved(
        &self,
        ctx: &OpContext,
        path: &ImmutablePath,
    ) -> CoreResult<()> {
        let status = ctx.run(self.store.pin_status(ctx, path)).await?;
        debug!(%path, pinned = status.pinned, detail = %status.detail, "pin status");
        match status.kind() {
            PinKind::None => Err(CoreError::NotPinned {
                path: path.to_string(),
            }),
            PinKind::Indirect => Err(CoreError::IndirectlyPinned {
                path: path.to_string(),
                detail: status.detail,
            }),
            PinKind::Direct => {
                ctx.run(self.store.pin_remove(ctx, path)).await?;
                info!(%path, "unpinned object");
                Ok(())
            }
        }
    }
}
