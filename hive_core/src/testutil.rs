//! Test utilities for `RemoteStore` implementations.
//!
//! Runs a common suite against any store to check that it honours the
//! `RemoteStore` contract. The suite calls `gc`, so only point it at a
//! disposable store.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! hive_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! ```ignore
//! use hive_core::testutil::RemoteStoreTests;
//!
//! #[tokio::test]
//! async fn test_my_store() {
//!     let store = MyStore::new(...);
//!     RemoteStoreTests::new(&store).run_all().await.unwrap();
//! }
//! ```

use bytes::BytesMut;
use futures::StreamExt;
use rand::Rng;
use std::path::Path;

use crate::context::OpContext;
use crate::identifier::ImmutablePath;
use crate::node::{FetchedNode, NodeKind};
use crate::pins::PinKind;
use crate::store::{RemoteStore, StoreError, StoreResult, SubmitOptions};
use crate::upload::UploadNode;

pub struct RemoteStoreTests<'a, S> {
    store: &'a S,
    ctx: OpContext,
    /// Mixed into file contents so runs never share objects.
    salt: String,
}

impl<'a, S: RemoteStore> RemoteStoreTests<'a, S> {
    pub fn new(store: &'a S) -> Self {
        let salt = format!("{:08x}", rand::rng().random::<u32>());
        Self {
            store,
            ctx: OpContext::new(),
            salt,
        }
    }

    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_submit_is_deterministic().await?;
        self.test_fetch_file().await?;
        self.test_directory_listing().await?;
        self.test_pin_lifecycle().await?;
        self.test_indirect_status().await?;
        self.test_gc_keeps_pinned().await?;
        self.test_cancelled_context().await?;
        Ok(())
    }

    fn scratch(&self) -> StoreResult<tempfile::TempDir> {
        Ok(tempfile::tempdir()?)
    }

    fn write(&self, dir: &Path, name: &str, body: &str) -> StoreResult<UploadNode> {
        let path = dir.join(name);
        std::fs::write(&path, format!("{body}-{}", self.salt))?;
        Ok(UploadNode::from_path(&path, false)?)
    }

    fn tree(&self, dir: &Path) -> StoreResult<UploadNode> {
        let root = dir.join("tree");
        std::fs::create_dir_all(root.join("sub"))?;
        std::fs::write(root.join("a.txt"), format!("a-{}", self.salt))?;
        std::fs::write(root.join("sub/b.txt"), format!("b-{}", self.salt))?;
        Ok(UploadNode::from_path(&root, false)?)
    }

    async fn read_file(&self, path: &ImmutablePath) -> StoreResult<Vec<u8>> {
        match self.store.fetch(&self.ctx, path).await? {
            FetchedNode::File { mut content, .. } => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = content.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.to_vec())
            }
            other => Err(fail(format!("expected a file, fetched {}", other.kind()))),
        }
    }

    pub async fn test_submit_is_deterministic(&self) -> StoreResult<()> {
        let dir = self.scratch()?;
        let node = self.write(dir.path(), "same.txt", "deterministic")?;
        let first = self
            .store
            .submit(&self.ctx, node.clone(), SubmitOptions::default())
            .await?;
        let second = self
            .store
            .submit(&self.ctx, node, SubmitOptions::default())
            .await?;
        check(first == second, "identical bytes yielded different identifiers")?;
        check(
            first.version() == cid::Version::V1,
            "default submission must produce a CIDv1",
        )
    }

    pub async fn test_fetch_file(&self) -> StoreResult<()> {
        let dir = self.scratch()?;
        let node = self.write(dir.path(), "fetch.txt", "fetch me")?;
        let cid = self
            .store
            .submit(&self.ctx, node, SubmitOptions::default())
            .await?;
        let body = self.read_file(&ImmutablePath::from_cid(cid)).await?;
        check(
            body == format!("fetch me-{}", self.salt).into_bytes(),
            "fetched bytes differ from submitted bytes",
        )
    }

    pub async fn test_directory_listing(&self) -> StoreResult<()> {
        let dir = self.scratch()?;
        let cid = self
            .store
            .submit(&self.ctx, self.tree(dir.path())?, SubmitOptions::default())
            .await?;
        let root = ImmutablePath::from_cid(cid);

        let mut entries = Vec::new();
        let mut stream = self.store.dir_list(&self.ctx, &root).await?;
        while let Some(entry) = stream.next().await {
            entries.push(entry?);
        }
        entries.sort();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        check(names == ["a.txt", "sub"], "unexpected directory listing")?;
        check(
            entries[0].kind == NodeKind::File && entries[1].kind == NodeKind::Directory,
            "unexpected entry kinds",
        )?;

        let nested = root.join("sub").map_err(|e| fail(e.to_string()))?;
        let body = self
            .read_file(&nested.join("b.txt").map_err(|e| fail(e.to_string()))?)
            .await?;
        check(
            body == format!("b-{}", self.salt).into_bytes(),
            "nested path resolved to the wrong content",
        )
    }

    pub async fn test_pin_lifecycle(&self) -> StoreResult<()> {
        let dir = self.scratch()?;
        let node = self.write(dir.path(), "pinned.txt", "pin me")?;
        let cid = self
            .store
            .submit(&self.ctx, node, SubmitOptions::default())
            .await?;
        let path = ImmutablePath::from_cid(cid);
        let name = format!("pin-{}", self.salt);

        check(
            self.store.pin_status(&self.ctx, &path).await?.kind() == PinKind::None,
            "fresh submission must be unpinned",
        )?;
        self.store.pin_add(&self.ctx, &path, &name).await?;
        check(
            self.store.pin_status(&self.ctx, &path).await?.kind() == PinKind::Direct,
            "pinned object must report a direct pin",
        )?;

        let mut found = false;
        let mut pins = self.store.pin_list(&self.ctx).await?;
        while let Some(record) = pins.next().await {
            let record = record?;
            found |= record.cid == cid && record.name == name;
        }
        check(found, "pin listing is missing the named pin")?;

        self.store.pin_remove(&self.ctx, &path).await?;
        check(
            self.store.pin_status(&self.ctx, &path).await?.kind() == PinKind::None,
            "unpinned object still reports a pin",
        )
    }

    pub async fn test_indirect_status(&self) -> StoreResult<()> {
        let dir = self.scratch()?;
        let cid = self
            .store
            .submit(&self.ctx, self.tree(dir.path())?, SubmitOptions::default())
            .await?;
        let root = ImmutablePath::from_cid(cid);
        self.store.pin_add(&self.ctx, &root, "tree").await?;

        let mut children = self.store.dir_list(&self.ctx, &root).await?;
        let mut child = None;
        while let Some(entry) = children.next().await {
            let entry = entry?;
            if entry.name == "a.txt" {
                child = Some(entry.cid);
            }
        }
        let child = child.ok_or_else(|| fail("a.txt missing from listing".into()))?;
        let status = self
            .store
            .pin_status(&self.ctx, &ImmutablePath::from_cid(child))
            .await?;
        check(
            status.kind() == PinKind::Indirect,
            "child of a pinned directory must be indirectly pinned",
        )?;

        self.store.pin_remove(&self.ctx, &root).await
    }

    pub async fn test_gc_keeps_pinned(&self) -> StoreResult<()> {
        let dir = self.scratch()?;
        let kept = self.write(dir.path(), "kept.txt", "kept")?;
        let dropped = self.write(dir.path(), "dropped.txt", "dropped")?;
        let kept = self
            .store
            .submit(&self.ctx, kept, SubmitOptions::default())
            .await?;
        let dropped = self
            .store
            .submit(&self.ctx, dropped, SubmitOptions::default())
            .await?;
        let kept_path = ImmutablePath::from_cid(kept);
        self.store.pin_add(&self.ctx, &kept_path, "kept").await?;

        let report = self.store.gc(&self.ctx).await?;
        check(report.removed.contains(&dropped), "gc kept an unpinned object")?;
        check(!report.removed.contains(&kept), "gc removed a pinned object")?;
        match self
            .store
            .fetch(&self.ctx, &ImmutablePath::from_cid(dropped))
            .await
        {
            Err(StoreError::NotFound(_)) => {}
            other => return Err(fail(format!("collected object still fetchable: {other:?}"))),
        }
        self.read_file(&kept_path).await?;

        self.store.pin_remove(&self.ctx, &kept_path).await
    }

    pub async fn test_cancelled_context(&self) -> StoreResult<()> {
        let ctx = OpContext::new();
        ctx.cancel();
        let dir = self.scratch()?;
        let node = self.write(dir.path(), "never.txt", "never")?;
        match self.store.submit(&ctx, node, SubmitOptions::default()).await {
            Err(StoreError::Cancelled) => Ok(()),
            other => Err(fail(format!("expected cancellation, got {other:?}"))),
        }
    }
}

fn fail(msg: String) -> StoreError {
    StoreError::Other(anyhow::anyhow!(msg))
}

fn check(cond: bool, msg: &str) -> StoreResult<()> {
    if cond { Ok(()) } else { Err(fail(msg.to_owned())) }
}
