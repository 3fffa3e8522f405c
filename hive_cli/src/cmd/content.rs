use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use hive_core::{OpContext, PinKind};
use hive_gateway::Gateway;

pub async fn get(gateway: &Gateway, ctx: &OpContext, reference: &str, out: &Path) -> Result<()> {
    let report = gateway.materialize(ctx, reference, out).await?;
    println!(
        "wrote {} files, {} directories, {} bytes to {}",
        report.files,
        report.directories,
        report.bytes,
        out.display()
    );
    Ok(())
}

pub async fn download(
    gateway: &Gateway,
    ctx: &OpContext,
    reference: &str,
    out: &Path,
) -> Result<()> {
    let bytes = gateway.download_file(ctx, reference).await?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

pub async fn cat(gateway: &Gateway, ctx: &OpContext, reference: &str) -> Result<()> {
    let text = gateway.cat(ctx, reference).await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

pub async fn ls(gateway: &Gateway, ctx: &OpContext, reference: &str) -> Result<()> {
    for entry in gateway.list_dir(ctx, reference).await? {
        println!(
            "{:<9} {:>12} {} {}",
            entry.kind, entry.size, entry.cid, entry.name
        );
    }
    Ok(())
}

pub async fn pins(gateway: &Gateway, ctx: &OpContext) -> Result<()> {
    let pins = gateway.list_pins(ctx).await?;
    if pins.is_empty() {
        println!("no pins");
    }
    for pin in pins {
        match pin.kind {
            PinKind::Indirect => println!("{} {}", pin.cid, pin.kind),
            _ => println!("{} {} {:?}", pin.cid, pin.kind, pin.name),
        }
    }
    Ok(())
}
