use std::path::Path;

use anyhow::Result;
use hive_core::OpContext;
use hive_gateway::Gateway;

pub async fn add(gateway: &Gateway, ctx: &OpContext, name: &str, path: &Path) -> Result<()> {
    let added = gateway.add(ctx, name, path).await?;
    println!("added {} as {name:?}", added.path);
    Ok(())
}

pub async fn pin(gateway: &Gateway, ctx: &OpContext, name: &str, reference: &str) -> Result<()> {
    gateway.pin(ctx, name, reference).await?;
    println!("pinned {reference} as {name:?}");
    Ok(())
}

pub async fn unpin(gateway: &Gateway, ctx: &OpContext, reference: &str) -> Result<()> {
    gateway.unpin(ctx, reference).await?;
    println!("unpinned {reference}");
    Ok(())
}

pub async fn rm(gateway: &Gateway, ctx: &OpContext, reference: &str) -> Result<()> {
    let report = gateway.delete(ctx, reference).await?;
    println!(
        "deleted {reference}, {} objects collected",
        report.removed.len()
    );
    Ok(())
}

pub async fn status(gateway: &Gateway, ctx: &OpContext, reference: &str) -> Result<()> {
    let status = gateway.pin_status(ctx, reference).await?;
    let state = if status.pinned { "pinned" } else { "not pinned" };
    println!("{reference}: {state} ({})", status.detail);
    Ok(())
}
