use hive_core::{CoreError, CoreResult, GcReport, OpContext};
use tracing::{info, warn};

use crate::{Gateway, resolve_reference};

impl Gateway {
    /// Unpins `object_path` and runs a collection pass.
    ///
    /// The two steps are not atomic. A refused unpin is reported as
    /// [`CoreError::DeleteRejected`]; a failed collection after a successful
    /// unpin as [`CoreError::PartialDelete`], in which case only the
    /// collection needs retrying. Nothing is retried here.
    pub async fn delete(&self, ctx: &OpContext, object_path: &str) -> CoreResult<GcReport> {
        let path = resolve_reference(object_path)?;

        match self.unpin_resolved(ctx, &path).await {
            Ok(()) => {}
            Err(err @ (CoreError::NotPinned { .. } | CoreError::IndirectlyPinned { .. })) => {
                return Err(CoreError::DeleteRejected {
                    path: path.to_string(),
                    source: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }

        match ctx.run(self.store.gc(ctx)).await {
            Ok(report) => {
                info!(%path, collected = report.removed.len(), "deleted object");
                Ok(report)
            }
            Err(err) => {
                warn!(%path, "unpinned but garbage collection failed: {err}");
                Err(CoreError::PartialDelete {
                    path: path.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }
}
