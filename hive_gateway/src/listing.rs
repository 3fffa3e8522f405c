use futures::TryStreamExt;
use hive_core::identifier::is_valid_segment;
use hive_core::{
    CoreError, CoreResult, DirEntry, EntryStream, NodeInfo, OpContext, PeerInfo, PinRecord,
    PingResult,
};
use tracing::debug;

use crate::{Gateway, resolve_reference};

impl Gateway {
    /// All pins known to the store, sorted by identifier then name.
    pub async fn list_pins(&self, ctx: &OpContext) -> CoreResult<Vec<PinRecord>> {
        let stream = ctx.run(self.store.pin_list(ctx)).await?;
        let mut pins = drain(ctx, stream).await?;
        pins.sort();
        Ok(pins)
    }

    /// Entries of the directory at `object_path`, in the order the store
    /// yields them. Any undecodable entry fails the whole call.
    pub async fn list_dir(&self, ctx: &OpContext, object_path: &str) -> CoreResult<Vec<DirEntry>> {
        let path = resolve_reference(object_path)?;
        let stream = ctx.run(self.store.dir_list(ctx, &path)).await?;
        let entries = drain(ctx, stream).await?;
        if let Some(bad) = entries.iter().find(|e| !is_valid_segment(&e.name)) {
            return Err(CoreError::MalformedEntry(format!(
                "unsafe entry name {:?} in {path}",
                bad.name
            )));
        }
        debug!(%path, entries = entries.len(), "listed directory");
        Ok(entries)
    }

    /// Currently connected peers, sorted by peer id.
    pub async fn connected_peers(&self, ctx: &OpContext) -> CoreResult<Vec<PeerInfo>> {
        let mut peers = ctx.run(self.store.connected_peers(ctx)).await?;
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(peers)
    }

    pub async fn node_info(&self, ctx: &OpContext, peer_id: &str) -> CoreResult<NodeInfo> {
        require_peer(peer_id)?;
        ctx.run(self.store.node_info(ctx, peer_id)).await
    }

    pub async fn ping(&self, ctx: &OpContext, peer_id: &str) -> CoreResult<Vec<PingResult>> {
        require_peer(peer_id)?;
        let stream = ctx.run(self.store.ping(ctx, peer_id)).await?;
        drain(ctx, stream).await
    }
}

fn require_peer(peer_id: &str) -> CoreResult<()> {
    if peer_id.is_empty() {
        return Err(CoreError::InvalidInput("peer id must not be empty".into()));
    }
    Ok(())
}

/// Collects a remote enumeration; the first failing item fails the call.
async fn drain<T>(ctx: &OpContext, mut stream: EntryStream<T>) -> CoreResult<Vec<T>> {
    let mut items = Vec::new();
    while let Some(item) = ctx.run(stream.try_next()).await? {
        items.push(item);
    }
    Ok(items)
}
