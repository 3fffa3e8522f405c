//! `RemoteStore` backed by a Kubo node's HTTP RPC API (`/api/v0`).

mod address;
mod upload;
mod wire;

pub use address::api_base_url;

use bytes::Bytes;
use cid::Cid;
use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt, stream};
use hive_core::{
    DirEntry, EntryStream, FetchedNode, GcReport, ImmutablePath, NodeInfo, NodeKind, OpContext,
    PeerInfo, PinRecord, PinStatus, PingResult, RemoteStore, StoreError, StoreResult,
    SubmitOptions, UploadNode,
};
use serde::de::DeserializeOwned;
use std::io;
use std::sync::Arc;

use crate::wire::{
    AddRes, ErrorRes, GcLine, IdRes, LsLink, LsRes, PinLsLine, PinLsRes, PingLine, StatRes,
    SwarmPeersRes,
};

/// Number of echo requests sent by `ping`.
const PING_COUNT: u32 = 3;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct KuboStoreConfig {
    /// RPC API address, as a multiaddr or an http(s) URL.
    pub api_addr: String,
}

impl Default for KuboStoreConfig {
    fn default() -> Self {
        Self {
            api_addr: "/ip4/127.0.0.1/tcp/5001".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KuboStore {
    inner: Arc<Client>,
}

#[derive(Debug)]
struct Client {
    api_url: String,
    http: reqwest::Client,
}

impl KuboStore {
    /// Prepares a client for the configured node. No request is sent until
    /// the first operation.
    pub fn create(config: KuboStoreConfig) -> StoreResult<Self> {
        let base = api_base_url(&config.api_addr)?;
        Ok(Self {
            inner: Arc::new(Client {
                api_url: format!("{base}/api/v0"),
                http: reqwest::Client::new(),
            }),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.inner.api_url
    }
}

impl Client {
    /// Issues one RPC call and returns the successful response.
    async fn call(
        &self,
        ctx: &OpContext,
        endpoint: &str,
        query: &[(&str, &str)],
        form: Option<reqwest::multipart::Form>,
    ) -> StoreResult<reqwest::Response> {
        ctx.check_store()?;
        let url = format!("{}/{endpoint}", self.api_url);
        log::debug!("POST {url} {query:?}");

        let mut request = self.http.post(&url).query(query);
        if let Some(form) = form {
            request = request.multipart(form);
        }
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let response = tokio::select! {
            biased;
            _ = ctx.token().cancelled() => return Err(StoreError::Cancelled),
            res = request.send() => res.map_err(|e| http_error(endpoint, e))?,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorRes>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        log::debug!("{endpoint} failed with {status}: {message}");
        Err(rpc_error(endpoint, &message))
    }

    async fn body(
        &self,
        ctx: &OpContext,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<Bytes> {
        let response = self.call(ctx, endpoint, query, None).await?;
        response.bytes().await.map_err(|e| http_error(endpoint, e))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<T> {
        let body = self.body(ctx, endpoint, query).await?;
        serde_json::from_slice(&body)
            .map_err(|e| StoreError::Other(anyhow::anyhow!("decoding {endpoint} response: {e}")))
    }

    async fn links(&self, ctx: &OpContext, path: &str) -> StoreResult<Vec<LsLink>> {
        let res: LsRes = self
            .json(ctx, "ls", &[("arg", path), ("resolve-type", "true")])
            .await?;
        Ok(res.objects.into_iter().flat_map(|o| o.links).collect())
    }

    async fn cat(&self, ctx: &OpContext, path: &str) -> StoreResult<hive_core::ByteStream> {
        let response = self.call(ctx, "cat", &[("arg", path)], None).await?;
        Ok(Box::new(
            response.bytes_stream().map_err(io::Error::other).boxed(),
        ))
    }

    /// Fetches `path`, whose kind is already known. Directory children are
    /// fetched one by one as the returned enumeration is polled.
    fn node(
        self: Arc<Self>,
        ctx: OpContext,
        path: String,
        kind: NodeKind,
        size: Option<u64>,
        target: String,
    ) -> BoxFuture<'static, StoreResult<FetchedNode>> {
        Box::pin(async move {
            Ok(match kind {
                NodeKind::File => FetchedNode::File {
                    size,
                    content: self.cat(&ctx, &path).await?,
                },
                NodeKind::Symlink => FetchedNode::Symlink { target },
                NodeKind::Directory => {
                    let links = self.links(&ctx, &path).await?;
                    let children = stream::iter(links).then(move |link| {
                        let client = Arc::clone(&self);
                        let ctx = ctx.clone();
                        async move {
                            let target = link.target.clone();
                            let entry = link.into_entry()?;
                            let child_path = format!("/ipfs/{}", entry.cid);
                            let node = client
                                .node(ctx, child_path, entry.kind, Some(entry.size), target)
                                .await?;
                            Ok::<_, StoreError>((entry.name, node))
                        }
                    });
                    FetchedNode::Directory(Box::new(children.boxed()))
                }
            })
        })
    }
}

fn http_error(endpoint: &str, err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::DeadlineExceeded
    } else {
        StoreError::Other(anyhow::Error::new(err).context(format!("kubo {endpoint} request")))
    }
}

fn rpc_error(endpoint: &str, message: &str) -> StoreError {
    if message.contains("not found") || message.contains("no link named") {
        StoreError::NotFound(message.to_owned())
    } else {
        StoreError::Other(anyhow::anyhow!("kubo {endpoint}: {message}"))
    }
}

#[async_trait::async_trait]
impl RemoteStore for KuboStore {
    async fn submit(
        &self,
        ctx: &OpContext,
        node: UploadNode,
        options: SubmitOptions,
    ) -> StoreResult<Cid> {
        let form = upload::multipart_form(&node).await?;
        let version = match options.cid_version {
            cid::Version::V0 => "0",
            cid::Version::V1 => "1",
        };
        let pin = if options.pin { "true" } else { "false" };
        let response = self
            .inner
            .call(
                ctx,
                "add",
                &[
                    ("cid-version", version),
                    ("pin", pin),
                    ("progress", "false"),
                ],
                Some(form),
            )
            .await?;
        let body = response.bytes().await.map_err(|e| http_error("add", e))?;

        let root = wire::ndjson::<AddRes>(&body)
            .into_iter()
            .collect::<StoreResult<Vec<_>>>()?
            .pop()
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("kubo add returned no objects")))?;
        log::debug!("added {} as {}", root.name, root.hash);
        wire::parse_cid(&root.hash)
    }

    async fn fetch(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<FetchedNode> {
        let arg = path.to_string();
        let stat: StatRes = self.inner.json(ctx, "files/stat", &[("arg", &arg)]).await?;
        let kind = match stat.kind.as_str() {
            "file" => NodeKind::File,
            "directory" => NodeKind::Directory,
            "symlink" => NodeKind::Symlink,
            other => {
                return Err(StoreError::Malformed(format!(
                    "{} has unknown type {other:?}",
                    stat.hash
                )));
            }
        };
        // Link targets are only reported by `ls`; a symlink root has none.
        Arc::clone(&self.inner)
            .node(ctx.clone(), arg, kind, Some(stat.size), String::new())
            .await
    }

    async fn pin_add(
        &self,
        ctx: &OpContext,
        path: &ImmutablePath,
        name: &str,
    ) -> StoreResult<()> {
        let arg = path.to_string();
        self.inner
            .body(
                ctx,
                "pin/add",
                &[("arg", &arg), ("recursive", "true"), ("name", name)],
            )
            .await?;
        Ok(())
    }

    async fn pin_remove(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<()> {
        let arg = path.to_string();
        self.inner
            .body(ctx, "pin/rm", &[("arg", &arg), ("recursive", "true")])
            .await?;
        Ok(())
    }

    async fn pin_status(&self, ctx: &OpContext, path: &ImmutablePath) -> StoreResult<PinStatus> {
        let arg = path.to_string();
        let res: PinLsRes = match self
            .inner
            .json(ctx, "pin/ls", &[("arg", &arg), ("type", "all")])
            .await
        {
            Ok(res) => res,
            Err(StoreError::Other(err)) if err.to_string().contains("is not pinned") => {
                return Ok(PinStatus::not_pinned());
            }
            Err(err) => return Err(err),
        };
        Ok(match res.keys.into_values().next() {
            Some(key) => PinStatus {
                pinned: true,
                detail: key.kind,
            },
            None => PinStatus::not_pinned(),
        })
    }

    async fn pin_list(&self, ctx: &OpContext) -> StoreResult<EntryStream<PinRecord>> {
        let body = self
            .inner
            .body(
                ctx,
                "pin/ls",
                &[("type", "all"), ("stream", "true"), ("names", "true")],
            )
            .await?;
        let records = wire::ndjson::<PinLsLine>(&body)
            .into_iter()
            .map(|line| line.and_then(PinLsLine::into_record));
        Ok(Box::new(stream::iter(records.collect::<Vec<_>>())))
    }

    async fn dir_list(
        &self,
        ctx: &OpContext,
        path: &ImmutablePath,
    ) -> StoreResult<EntryStream<DirEntry>> {
        let links = self.inner.links(ctx, &path.to_string()).await?;
        let entries: Vec<_> = links.into_iter().map(LsLink::into_entry).collect();
        Ok(Box::new(stream::iter(entries)))
    }

    async fn gc(&self, ctx: &OpContext) -> StoreResult<GcReport> {
        let body = self.inner.body(ctx, "repo/gc", &[]).await?;
        let mut report = GcReport::default();
        for line in wire::ndjson::<GcLine>(&body) {
            let line = line?;
            if !line.error.is_empty() {
                return Err(StoreError::Other(anyhow::anyhow!(
                    "kubo repo/gc: {}",
                    line.error
                )));
            }
            if let Some(key) = line.key {
                report.removed.push(wire::parse_cid(&key.cid)?);
            }
        }
        Ok(report)
    }

    async fn node_info(&self, ctx: &OpContext, peer_id: &str) -> StoreResult<NodeInfo> {
        let res: IdRes = self.inner.json(ctx, "id", &[("arg", peer_id)]).await?;
        Ok(res.into())
    }

    async fn ping(&self, ctx: &OpContext, peer_id: &str) -> StoreResult<EntryStream<PingResult>> {
        let count = PING_COUNT.to_string();
        let body = self
            .inner
            .body(ctx, "ping", &[("arg", peer_id), ("count", &count)])
            .await?;
        let results: Vec<_> = wire::ndjson::<PingLine>(&body)
            .into_iter()
            .map(|line| line.map(PingResult::from))
            .collect();
        Ok(Box::new(stream::iter(results)))
    }

    async fn connected_peers(&self, ctx: &OpContext) -> StoreResult<Vec<PeerInfo>> {
        let res: SwarmPeersRes = self
            .inner
            .json(
                ctx,
                "swarm/peers",
                &[("latency", "true"), ("direction", "true")],
            )
            .await?;
        Ok(res
            .peers
            .unwrap_or_default()
            .into_iter()
            .map(PeerInfo::from)
            .collect())
    }
}
