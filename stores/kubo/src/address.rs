use anyhow::{Context, anyhow, bail};

/// Converts the configured RPC address into a base URL without a trailing
/// slash.
///
/// Accepts plain `http(s)://` URLs and multiaddrs of the form
/// `/ip4|ip6|dns|dns4|dns6/<host>/tcp/<port>[/http|/https]`.
pub fn api_base_url(addr: &str) -> anyhow::Result<String> {
    let addr = addr.trim();
    if addr.starts_with("http://") || addr.starts_with("https://") {
        return Ok(addr.trim_end_matches('/').to_owned());
    }
    if !addr.starts_with('/') {
        bail!("unsupported api address {addr:?}");
    }

    let parts: Vec<&str> = addr.trim_end_matches('/').split('/').skip(1).collect();
    let [proto, host, "tcp", port, rest @ ..] = parts.as_slice() else {
        bail!("expected /<ip4|ip6|dns|dns4|dns6>/<host>/tcp/<port> in {addr:?}");
    };
    let host = match *proto {
        "ip4" | "dns" | "dns4" | "dns6" => host.to_string(),
        "ip6" => format!("[{host}]"),
        other => bail!("unsupported multiaddr protocol {other:?} in {addr:?}"),
    };
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in {addr:?}"))?;
    let scheme = match rest {
        [] | ["http"] => "http",
        ["https"] | ["tls", "http"] => "https",
        _ => return Err(anyhow!("unsupported multiaddr suffix in {addr:?}")),
    };
    Ok(format!("{scheme}://{host}:{port}"))
}
