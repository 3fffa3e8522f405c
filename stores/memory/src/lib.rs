//! In-process `RemoteStore` with real content addressing.
//!
//! Objects are addressed by CIDv1 over a BLAKE3 multihash: raw codec for
//! file bytes, dag-pb for directories and symlinks. Direct pins protect
//! everything reachable from them, and `gc` sweeps whatever no pin reaches.
//! Faults can be injected to exercise error paths in callers.

use bytes::Bytes;
use cid::Cid;
use cid::multihash::Multihash;
use dashmap::{DashMap, DashSet};
use futures::stream;
use hive_core::{
    DirEntry, EntryStream, FetchedNode, GcReport, ImmutablePath, NodeInfo, NodeKind, OpContext,
    PeerInfo, PinKind, PinRecord, PinStatus, PingResult, RemoteStore, StoreError, StoreResult,
    SubmitOptions, UploadNode,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RAW: u64 = 0x55;
const DAG_PB: u64 = 0x70;
const BLAKE3: u64 = 0x1e;

/// Files are served in chunks of this size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Identity reported by `node_info` and `ping`.
pub const LOCAL_PEER_ID: &str = "12D3KooWMemoryStoreLocalPeer";

#[derive(Debug, Clone)]
enum Object {
    File(Bytes),
    Directory(Vec<DirEntry>),
    Symlink(String),
}

impl Object {
    fn kind(&self) -> NodeKind {
        match self {
            Object::File(_) => NodeKind::File,
            Object::Directory(_) => NodeKind::Directory,
            Object::Symlink(_) => NodeKind::Symlink,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Object::File(bytes) => bytes.len() as u64,
            Object::Directory(links) => links.iter().map(|l| l.size).sum(),
            Object::Symlink(target) => target.len() as u64,
        }
    }

    /// Canonical encoding hashed into the object's identifier.
    fn encode(&self) -> Vec<u8> {
        match self {
            Object::File(bytes) => bytes.to_vec(),
            Object::Directory(links) => {
                let mut out = b"dir\0".to_vec();
                for link in links {
                    out.extend_from_slice(link.name.as_bytes());
                    out.push(0);
                    out.extend_from_slice(&link.cid.to_bytes());
                    out.push(0);
                }
                out
            }
            Object::Symlink(target) => {
                let mut out = b"symlink\0".to_vec();
                out.extend_from_slice(target.as_bytes());
                out
            }
        }
    }

    fn codec(&self) -> u64 {
        match self {
            Object::File(_) => RAW,
            Object::Directory(_) | Object::Symlink(_) => DAG_PB,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_gc: AtomicBool,
    fail_pins: AtomicBool,
    failing_reads: DashSet<Cid>,
    malformed_listings: DashSet<Cid>,
    /// Links appended to a directory's enumerations.
    extra_links: DashMap<Cid, Vec<DirEntry>>,
    /// Sizes reported instead of the real ones.
    reported_sizes: DashMap<Cid, u64>,
    /// Tokens cancelled the first time an object is read.
    cancel_on_read: DashMap<Cid, CancellationToken>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: DashMap<Cid, Object>,
    /// Direct pins: identifier to the names it was pinned under.
    pins: DashMap<Cid, Vec<String>>,
    faults: Faults,
    calls: AtomicU64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `RemoteStore` calls served so far.
    pub fn remote_calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Number of objects currently held.
    pub fn object_count(&self) -> usize {
        self.inner.objects.len()
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.inner.objects.contains_key(cid)
    }

    /// Makes every following `gc` call fail.
    pub fn fail_gc(&self, fail: bool) {
        self.inner.faults.fail_gc.store(fail, Ordering::SeqCst);
    }

    /// Makes every following `pin_add` call fail.
    pub fn fail_pins(&self, fail: bool) {
        self.inner.faults.fail_pins.store(fail, Ordering::SeqCst);
    }

    /// Makes reads of `cid` fail. A file's content stream yields its first
    /// chunk and then an I/O error.
    pub fn fail_reads_of(&self, cid: Cid) {
        self.inner.faults.failing_reads.insert(cid);
    }

    /// Appends an undecodable entry to every enumeration of directory `cid`.
    pub fn corrupt_listing_of(&self, cid: Cid) {
        self.inner.faults.malformed_listings.insert(cid);
    }

    /// Appends a link `name -> target` to every enumeration of directory
    /// `dir`. The name is not validated, and the directory's identifier is
    /// unchanged.
    pub fn inject_link(&self, dir: Cid, name: &str, target: Cid) {
        let entry = self.inner.objects.get(&target).map(|o| DirEntry {
            name: name.to_owned(),
            cid: target,
            size: o.size(),
            kind: o.kind(),
        });
        if let Some(entry) = entry {
            self.inner
                .faults
                .extra_links
                .entry(dir)
                .or_default()
                .push(entry);
        }
    }

    /// Reports `size` for file `cid` instead of its real length.
    pub fn misreport_size_of(&self, cid: Cid, size: u64) {
        self.inner.faults.reported_sizes.insert(cid, size);
    }

    /// Cancels `token` when `cid` is next read, either as a fetched root or
    /// as a child produced by a directory enumeration.
    pub fn cancel_on_read_of(&self, cid: Cid, token: CancellationToken) {
        self.inner.faults.cancel_on_read.insert(cid, token);
    }

    /// Direct pins with the names they were added under.
    pub fn pin_names(&self) -> HashMap<Cid, Vec<String>> {
        self.inner
            .pins
            .iter()
            .map(|p| (*p.key(), p.value().clone()))
            .collect()
    }

    fn begin(&self, ctx: &OpContext) -> StoreResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        ctx.check_store()
    }

    fn insert(&self, name: &str, object: Object) -> StoreResult<DirEntry> {
        let cid = object_cid(&object)?;
        let entry = DirEntry {
            name: name.to_owned(),
            cid,
            size: object.size(),
            kind: object.kind(),
        };
        self.inner.objects.entry(cid).or_insert(object);
        Ok(entry)
    }

    /// Stores the tree bottom-up: children are inserted before the
    /// directory that links them.
    async fn insert_tree(&self, ctx: &OpContext, root: &UploadNode) -> StoreResult<DirEntry> {
        enum Step<'a> {
            Enter(&'a UploadNode),
            Leave(&'a str, usize),
        }

        let mut steps = vec![Step::Enter(root)];
        let mut done: Vec<DirEntry> = Vec::new();
        while let Some(step) = steps.pop() {
            ctx.check_store()?;
            match step {
                Step::Enter(UploadNode::Directory { name, entries }) => {
                    steps.push(Step::Leave(name, entries.len()));
                    steps.extend(entries.iter().rev().map(Step::Enter));
                }
                Step::Enter(UploadNode::File { name, source, .. }) => {
                    let bytes = tokio::fs::read(source).await?;
                    done.push(self.insert(name, Object::File(bytes.into()))?);
                }
                Step::Enter(UploadNode::Symlink { name, target }) => {
                    done.push(self.insert(name, Object::Symlink(target.clone()))?);
                }
                Step::Leave(name, count) => {
                    let links = done.split_off(done.len() - count);
                    done.push(self.insert(name, Object::Directory(links))?);
                }
            }
        }
        done.pop()
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("empty upload")))
    }
}

impl Inner {
    fn resolve(&self, path: &ImmutablePath) -> StoreResult<Cid> {
        let mut cid = *path.root();
        if !self.objects.contains_key(&cid) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        for segment in path.segments() {
            let next = match self.objects.get(&cid).as_deref() {
                Some(Object::Directory(links)) => links
                    .iter()
                    .find(|l| &l.name == segment)
                    .map(|l| l.cid),
                _ => None,
            };
            cid = next.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        }
        Ok(cid)
    }

    fn links(&self, cid: &Cid) -> StoreResult<Vec<StoreResult<DirEntry>>> {
        let object = self
            .objects
            .get(cid)
            .ok_or_else(|| StoreError::NotFound(cid.to_string()))?;
        let mut links: Vec<_> = match &*object {
            Object::Directory(links) => links.iter().cloned().map(Ok).collect(),
            _ => Vec::new(),
        };
        if let Some(extra) = self.faults.extra_links.get(cid) {
            links.extend(extra.iter().cloned().map(Ok));
        }
        if self.faults.malformed_listings.contains(cid) {
            links.push(Err(StoreError::Malformed(format!(
                "undecodable link in {cid}"
            ))));
        }
        Ok(links)
    }

    fn node(self: &Arc<Self>, cid: &Cid) -> StoreResult<FetchedNode> {
        let object = self
            .objects
            .get(cid)
            .map(|o| o.clone())
            .ok_or_else(|| StoreError::NotFound(cid.to_string()))?;
        let failing = self.faults.failing_reads.contains(cid);
        if let Some((_, token)) = self.faults.cancel_on_read.remove(cid) {
            token.cancel();
        }

        Ok(match object {
            Object::File(bytes) => FetchedNode::File {
                size: Some(
                    self.faults
                        .reported_sizes
                        .get(cid)
                        .map_or(bytes.len() as u64, |s| *s),
                ),
                content: file_stream(bytes, failing),
            },
            Object::Symlink(target) => FetchedNode::Symlink { target },
            Object::Directory(_) if failing => {
                return Err(StoreError::Other(anyhow::anyhow!(
                    "injected read failure for {cid}"
                )));
            }
            Object::Directory(_) => {
                let inner = Arc::clone(self);
                let children = self.links(cid)?.into_iter().map(
                    move |link: StoreResult<DirEntry>| -> StoreResult<(String, FetchedNode)> {
                        let link = link?;
                        Ok((link.name, inner.node(&link.cid)?))
                    },
                );
                FetchedNode::Directory(Box::new(stream::iter(children)))
            }
        })
    }

    /// Every object reachable from `root`, `root` included.
    fn reachable(&self, root: &Cid) -> HashSet<Cid> {
        let mut seen = HashSet::new();
        let mut stack = vec![*root];
        while let Some(cid) = stack.pop() {
            if !seen.insert(cid) {
                continue;
            }
            if let Some(object) = self.objects.get(&cid)
                && let Object::Directory(links) = &*object
            {
                stack.extend(links.iter().map(|l| l.cid));
            }
        }
        seen
    }

    fn pinned_roots(&self) -> Vec<Cid> {
        self.pins.iter().map(|p| *p.key()).collect()
    }
}

fn object_cid(object: &Object) -> StoreResult<Cid> {
    let digest = blake3::hash(&object.encode());
    let hash = Multihash::<64>::wrap(BLAKE3, digest.as_bytes())
        .map_err(|e| StoreError::Other(e.into()))?;
    Ok(Cid::new_v1(object.codec(), hash))
}

fn file_stream(bytes: Bytes, fail_after_first: bool) -> hive_core::ByteStream {
    let mut chunks: Vec<Result<Bytes, io::Error>> = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + CHUNK_SIZE).min(bytes.len());
        chunks.push(Ok(bytes.slice(offset..end)));
        offset = end;
    }
    if fail_after_first {
        chunks.truncate(1);
        chunks.push(Err(io::Error::other("injected read failure")));
    }
    Box::new(stream::iter(chunks))
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn submit(
        &self,
        ctx: &OpContext,
        node: UploadNode,
        options: SubmitOptions,
    ) -> StoreResult<Cid> {
        self.begin(ctx)?;
        if options.cid_version != cid::Version::V1 {
            return Err(StoreError::Other(anyhow::anyhow!(
                "the memory store only produces CIDv1"
            )));
        }
        let root = self.insert_tree(ctx, &node).await?;
        if options.pin {
            self.inner
                .pins
                .entry(root.cid)
                .or_default()
                .push(root.name.clone());
        }
        tracing::debug!(cid = %root.cid, kind = %root.kind, size = root.size, "stored upload");
        Ok(root.cid)
    }

    async fn fetch(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<FetchedNode> {
        self.begin(ctx)?;
        let cid = self.inner.resolve(path)?;
        self.inner.node(&cid)
    }

    async fn pin_add(
        &self,
        ctx: &OpContext,
        path: &ImmutablePath,
        name: &str,
    ) -> StoreResult<()> {
        self.begin(ctx)?;
        if self.inner.faults.fail_pins.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!("injected pin failure")));
        }
        let cid = self.inner.resolve(path)?;
        self.inner.pins.entry(cid).or_default().push(name.to_owned());
        Ok(())
    }

    async fn pin_remove(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<()> {
        self.begin(ctx)?;
        let cid = self.inner.resolve(path)?;
        match self.inner.pins.remove(&cid) {
            Some(_) => Ok(()),
            None => Err(StoreError::Other(anyhow::anyhow!(
                "{cid} is not pinned or pinned indirectly"
            ))),
        }
    }

    async fn pin_status(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<PinStatus> {
        self.begin(ctx)?;
        // A root identifier has a status even once its content is collected.
        let cid = if path.is_root() {
            *path.root()
        } else {
            self.inner.resolve(path)?
        };
        if self.inner.pins.contains_key(&cid) {
            return Ok(PinStatus::direct("recursive"));
        }
        for root in self.inner.pinned_roots() {
            if self.inner.reachable(&root).contains(&cid) {
                return Ok(PinStatus::indirect_through(&root));
            }
        }
        Ok(PinStatus::not_pinned())
    }

    async fn pin_list(&self, ctx: &OpContext) -> StoreResult<EntryStream<PinRecord>> {
        self.begin(ctx)?;
        let mut records = Vec::new();
        let mut indirect = HashSet::new();
        for pin in self.inner.pins.iter() {
            for name in pin.value() {
                records.push(PinRecord {
                    cid: *pin.key(),
                    name: name.clone(),
                    kind: PinKind::Direct,
                });
            }
            indirect.extend(self.inner.reachable(pin.key()));
        }
        records.extend(
            indirect
                .into_iter()
                .filter(|cid| !self.inner.pins.contains_key(cid))
                .map(|cid| PinRecord {
                    cid,
                    name: String::new(),
                    kind: PinKind::Indirect,
                }),
        );
        Ok(Box::new(stream::iter(records.into_iter().map(Ok))))
    }

    async fn dir_list(
        &self,
        ctx: &OpContext,
        path: &ImmutablePath,
    ) -> StoreResult<EntryStream<DirEntry>> {
        self.begin(ctx)?;
        let cid = self.inner.resolve(path)?;
        Ok(Box::new(stream::iter(self.inner.links(&cid)?)))
    }

    async fn gc(&self, ctx: &OpContext) -> StoreResult<GcReport> {
        self.begin(ctx)?;
        if self.inner.faults.fail_gc.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!(
                "injected garbage collection failure"
            )));
        }
        let mut live = HashSet::new();
        for root in self.inner.pinned_roots() {
            live.extend(self.inner.reachable(&root));
        }
        let dead: Vec<Cid> = self
            .inner
            .objects
            .iter()
            .map(|o| *o.key())
            .filter(|cid| !live.contains(cid))
            .collect();
        for cid in &dead {
            self.inner.objects.remove(cid);
        }
        tracing::debug!(removed = dead.len(), "collected unpinned objects");
        Ok(GcReport { removed: dead })
    }

    async fn node_info(&self, ctx: &OpContext, peer_id: &str) -> StoreResult<NodeInfo> {
        self.begin(ctx)?;
        if peer_id != LOCAL_PEER_ID {
            return Err(StoreError::NotFound(format!("peer {peer_id}")));
        }
        Ok(NodeInfo {
            id: LOCAL_PEER_ID.to_owned(),
            public_key: String::new(),
            addresses: Vec::new(),
            agent_version: concat!("hive-memory/", env!("CARGO_PKG_VERSION")).to_owned(),
            protocols: Vec::new(),
        })
    }

    async fn ping(&self, ctx: &OpContext, peer_id: &str) -> StoreResult<EntryStream<PingResult>> {
        self.begin(ctx)?;
        let results = if peer_id == LOCAL_PEER_ID {
            vec![Ok(PingResult {
                success: true,
                text: "pong".to_owned(),
                time: Duration::ZERO,
            })]
        } else {
            vec![Ok(PingResult {
                success: false,
                text: format!("peer {peer_id} is not connected"),
                time: Duration::ZERO,
            })]
        };
        Ok(Box::new(stream::iter(results)))
    }

    async fn connected_peers(&self, ctx: &OpContext) -> StoreResult<Vec<PeerInfo>> {
        self.begin(ctx)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, TryStreamExt};

    fn file_node(dir: &std::path::Path, name: &str, body: &[u8]) -> UploadNode {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        UploadNode::from_path(&path, false).unwrap()
    }

    #[tokio::test]
    async fn test_identical_bytes_share_an_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let ctx = OpContext::new();
        let a = store
            .submit(&ctx, file_node(dir.path(), "a", b"same"), SubmitOptions::default())
            .await
            .unwrap();
        let b = store
            .submit(&ctx, file_node(dir.path(), "b", b"same"), SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.codec(), RAW);
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn test_directory_ids_depend_on_names() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new();
        let store = MemoryStore::new();
        for name in ["one", "two"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("one/x"), b"body").unwrap();
        std::fs::write(dir.path().join("two/y"), b"body").unwrap();

        let one = UploadNode::from_path(&dir.path().join("one"), false).unwrap();
        let two = UploadNode::from_path(&dir.path().join("two"), false).unwrap();
        let one = store.submit(&ctx, one, SubmitOptions::default()).await.unwrap();
        let two = store.submit(&ctx, two, SubmitOptions::default()).await.unwrap();
        assert_ne!(one, two);
        assert_eq!(one.codec(), DAG_PB);
    }

    #[tokio::test]
    async fn test_failing_read_yields_first_chunk_then_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new();
        let store = MemoryStore::new();
        let body = vec![7u8; CHUNK_SIZE + 10];
        let cid = store
            .submit(&ctx, file_node(dir.path(), "big", &body), SubmitOptions::default())
            .await
            .unwrap();
        store.fail_reads_of(cid);

        let FetchedNode::File { mut content, .. } = store
            .fetch(&ctx, &ImmutablePath::from_cid(cid))
            .await
            .unwrap()
        else {
            panic!("expected a file");
        };
        assert_eq!(content.next().await.unwrap().unwrap().len(), CHUNK_SIZE);
        assert!(content.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_corrupt_listing_reports_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new();
        let store = MemoryStore::new();
        std::fs::write(dir.path().join("f"), b"f").unwrap();
        let node = UploadNode::from_path(dir.path(), false).unwrap();
        let cid = store.submit(&ctx, node, SubmitOptions::default()).await.unwrap();
        store.corrupt_listing_of(cid);

        let err = store
            .dir_list(&ctx, &ImmutablePath::from_cid(cid))
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_injected_link_is_listed_and_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OpContext::new();
        let store = MemoryStore::new();
        std::fs::write(dir.path().join("f"), b"f").unwrap();
        let node = UploadNode::from_path(dir.path(), false).unwrap();
        let root = store.submit(&ctx, node, SubmitOptions::default()).await.unwrap();
        let file = store
            .dir_list(&ctx, &ImmutablePath::from_cid(root))
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap()[0]
            .cid;
        store.inject_link(root, "../outside", file);

        let names: Vec<_> = store
            .dir_list(&ctx, &ImmutablePath::from_cid(root))
            .await
            .unwrap()
            .map_ok(|e| e.name)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, ["f", "../outside"]);
    }

    #[tokio::test]
    async fn test_every_call_is_counted() {
        let ctx = OpContext::new();
        let store = MemoryStore::new();
        assert_eq!(store.remote_calls(), 0);
        store.gc(&ctx).await.unwrap();
        store.connected_peers(&ctx).await.unwrap();
        assert_eq!(store.remote_calls(), 2);
    }
}
