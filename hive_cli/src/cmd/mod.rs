use std::path::Path;

use anyhow::{Context, Result, bail};
use hive_core::{OpContext, UploadNode};
use hive_gateway::{Gateway, HiveConfig, create_store};
use tracing::{debug, warn};

use crate::Commands;
use crate::init_config::load_config;

mod content;
mod network;
mod objects;

pub async fn run_command(config_file: &Path, cmd: Commands) -> Result<()> {
    if let Commands::Config { cmd } = cmd {
        return cmd.run(config_file);
    }

    let config = load_config(config_file)?;
    debug!("using store {:?}", config.store);
    let gateway = open_gateway(&config).await?;
    let ctx = command_context(&config);

    match cmd {
        Commands::Add { path, name } => {
            check_upload_size(&path, &config).await?;
            objects::add(&gateway, &ctx, &name, &path).await
        }
        Commands::Pin { reference, name } => objects::pin(&gateway, &ctx, &name, &reference).await,
        Commands::Unpin { reference } => objects::unpin(&gateway, &ctx, &reference).await,
        Commands::Rm { reference } => objects::rm(&gateway, &ctx, &reference).await,
        Commands::Status { reference } => objects::status(&gateway, &ctx, &reference).await,
        Commands::Get { reference, out } => content::get(&gateway, &ctx, &reference, &out).await,
        Commands::Download { reference, out } => {
            content::download(&gateway, &ctx, &reference, &out).await
        }
        Commands::Cat { reference } => content::cat(&gateway, &ctx, &reference).await,
        Commands::Ls { reference } => content::ls(&gateway, &ctx, &reference).await,
        Commands::Pins => content::pins(&gateway, &ctx).await,
        Commands::Peers => network::peers(&gateway, &ctx).await,
        Commands::Info { peer } => network::info(&gateway, &ctx, &peer).await,
        Commands::Ping { peer } => network::ping(&gateway, &ctx, &peer).await,
        Commands::Config { .. } => Ok(()),
    }
}

async fn open_gateway(config: &HiveConfig) -> Result<Gateway> {
    let store = create_store(config.store.clone()).await?;
    Ok(Gateway::from_arc(store).with_hidden_files(config.gateway.include_hidden))
}

/// Context of a single command: bounded by the configured timeout and
/// cancelled on Ctrl-C.
fn command_context(config: &HiveConfig) -> OpContext {
    let ctx = OpContext::with_timeout(config.gateway.request_timeout());
    let token = ctx.token().clone();
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    warn!("interrupted, cancelling");
                    token.cancel();
                }
            }
            _ = token.cancelled() => {}
        }
    });
    ctx
}

/// Rejects inputs above `max_upload_size`. Unreadable paths are left to
/// `add`, which reports them as not found.
async fn check_upload_size(path: &Path, config: &HiveConfig) -> Result<()> {
    let limit = config.gateway.max_upload_size;
    let root = path.to_path_buf();
    let include_hidden = config.gateway.include_hidden;
    let walked = tokio::task::spawn_blocking(move || UploadNode::from_path(&root, include_hidden))
        .await
        .context("directory walk panicked")?;
    if let Ok(node) = walked {
        let size = node.total_size();
        if size > limit {
            bail!("{} is {size} bytes, larger than the upload limit of {limit} bytes", path.display());
        }
    }
    Ok(())
}
