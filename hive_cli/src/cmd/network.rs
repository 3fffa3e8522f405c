use anyhow::Result;
use hive_core::OpContext;
use hive_gateway::Gateway;

pub async fn peers(gateway: &Gateway, ctx: &OpContext) -> Result<()> {
    let peers = gateway.connected_peers(ctx).await?;
    println!("{} connected peers", peers.len());
    for peer in peers {
        let latency = peer
            .latency
            .map(|l| format!("{l:?}"))
            .unwrap_or_else(|| "-".to_owned());
        println!("{} {} {} {latency}", peer.id, peer.address, peer.direction);
    }
    Ok(())
}

pub async fn info(gateway: &Gateway, ctx: &OpContext, peer: &str) -> Result<()> {
    let info = gateway.node_info(ctx, peer).await?;
    println!("id:         {}", info.id);
    println!("public key: {}", info.public_key);
    println!("agent:      {}", info.agent_version);
    println!("addresses:");
    for addr in &info.addresses {
        println!("  {addr}");
    }
    println!("protocols:");
    for proto in &info.protocols {
        println!("  {proto}");
    }
    Ok(())
}

pub async fn ping(gateway: &Gateway, ctx: &OpContext, peer: &str) -> Result<()> {
    for reply in gateway.ping(ctx, peer).await? {
        let status = if reply.success { "ok" } else { "failed" };
        if reply.text.is_empty() {
            println!("{status} {:?}", reply.time);
        } else {
            println!("{status} {:?} {}", reply.time, reply.text);
        }
    }
    Ok(())
}
