//! JSON shapes of the Kubo RPC responses and their conversion into core
//! types.

use cid::Cid;
use hive_core::{
    DirEntry, Direction, NodeInfo, NodeKind, PeerInfo, PinKind, PinRecord, PingResult, StoreError,
    StoreResult,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorRes {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddRes {
    pub name: String,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatRes {
    pub hash: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsRes {
    #[serde(default)]
    pub objects: Vec<LsObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsObject {
    #[serde(default)]
    pub links: Vec<LsLink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LsLink {
    pub name: String,
    pub hash: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "Type")]
    pub kind: i32,
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinLsRes {
    #[serde(default)]
    pub keys: HashMap<String, PinLsKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinLsKey {
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PinLsLine {
    pub cid: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct GcLine {
    #[serde(rename = "Key")]
    pub key: Option<CidLink>,
    #[serde(rename = "Error", default)]
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct CidLink {
    #[serde(rename = "/")]
    pub cid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdRes {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub agent_version: String,
    #[serde(default)]
    pub protocols: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PingLine {
    pub success: bool,
    /// Nanoseconds.
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwarmPeersRes {
    #[serde(default)]
    pub peers: Option<Vec<SwarmPeer>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwarmPeer {
    pub addr: String,
    pub peer: String,
    #[serde(default)]
    pub latency: String,
    #[serde(default)]
    pub direction: i32,
}

/// Decodes a newline-delimited JSON body. Blank lines are skipped; each
/// undecodable line becomes a `Malformed` item.
pub fn ndjson<T: DeserializeOwned>(body: &[u8]) -> Vec<StoreResult<T>> {
    body.split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| {
            serde_json::from_slice(line).map_err(|e| StoreError::Malformed(e.to_string()))
        })
        .collect()
}

pub fn parse_cid(raw: &str) -> StoreResult<Cid> {
    Cid::try_from(raw).map_err(|e| StoreError::Malformed(format!("invalid cid {raw:?}: {e}")))
}

/// Kind of a link as reported by `ls` (unixfs data type).
pub fn link_kind(kind: i32) -> Option<NodeKind> {
    match kind {
        // raw, file
        0 | 2 => Some(NodeKind::File),
        // directory, HAMT shard
        1 | 5 => Some(NodeKind::Directory),
        4 => Some(NodeKind::Symlink),
        _ => None,
    }
}

impl LsLink {
    pub fn into_entry(self) -> StoreResult<DirEntry> {
        let kind = link_kind(self.kind).ok_or_else(|| {
            StoreError::Malformed(format!("link {:?} has unknown type {}", self.name, self.kind))
        })?;
        Ok(DirEntry {
            cid: parse_cid(&self.hash)?,
            name: self.name,
            size: self.size,
            kind,
        })
    }
}

pub fn pin_kind(kind: &str) -> PinKind {
    if kind.starts_with("indirect") {
        PinKind::Indirect
    } else if kind == "recursive" || kind == "direct" {
        PinKind::Direct
    } else {
        PinKind::None
    }
}

impl PinLsLine {
    pub fn into_record(self) -> StoreResult<PinRecord> {
        Ok(PinRecord {
            cid: parse_cid(&self.cid)?,
            kind: pin_kind(&self.kind),
            name: self.name,
        })
    }
}

impl From<IdRes> for NodeInfo {
    fn from(res: IdRes) -> Self {
        NodeInfo {
            id: res.id,
            public_key: res.public_key,
            addresses: res.addresses.unwrap_or_default(),
            agent_version: res.agent_version,
            protocols: res.protocols.unwrap_or_default(),
        }
    }
}

impl From<PingLine> for PingResult {
    fn from(line: PingLine) -> Self {
        PingResult {
            success: line.success,
            text: line.text,
            time: Duration::from_nanos(line.time),
        }
    }
}

impl From<SwarmPeer> for PeerInfo {
    fn from(peer: SwarmPeer) -> Self {
        PeerInfo {
            id: peer.peer,
            address: peer.addr,
            direction: match peer.direction {
                1 => Direction::Inbound,
                2 => Direction::Outbound,
                _ => Direction::Unknown,
            },
            latency: parse_go_duration(&peer.latency),
        }
    }
}

/// Parses a Go `time.Duration` string such as `1m2.5s` or `830µs`.
/// Returns `None` for anything else, including `n/a`.
pub fn parse_go_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }
    let mut rest = s;
    let mut total = 0f64;
    let mut any = false;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * nanos_per_unit;
        any = true;
    }
    any.then(|| Duration::from_nanos(total.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIR: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
    const FILE: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

    #[test]
    fn test_ls_links() {
        let body = format!(
            r#"{{"Objects":[{{"Hash":"{DIR}","Links":[
                {{"Name":"a.txt","Hash":"{FILE}","Size":5,"Type":2,"Target":""}},
                {{"Name":"sub","Hash":"{DIR}","Size":0,"Type":1,"Target":""}},
                {{"Name":"ln","Hash":"{FILE}","Size":5,"Type":4,"Target":"a.txt"}}
            ]}}]}}"#
        );
        let res: LsRes = serde_json::from_str(&body).unwrap();
        let entries: Vec<_> = res.objects[0]
            .links
            .iter()
            .cloned()
            .map(|l| l.into_entry().unwrap())
            .collect();
        assert_eq!(entries[0].kind, NodeKind::File);
        assert_eq!(entries[0].size, 5);
        assert_eq!(entries[1].kind, NodeKind::Directory);
        assert_eq!(entries[2].kind, NodeKind::Symlink);
        assert_eq!(res.objects[0].links[2].target, "a.txt");
    }

    #[test]
    fn test_unknown_link_type_is_malformed() {
        let link = LsLink {
            name: "meta".into(),
            hash: FILE.into(),
            size: 0,
            kind: 3,
            target: String::new(),
        };
        assert!(matches!(link.into_entry(), Err(StoreError::Malformed(_))));

        let link = LsLink {
            name: "bad".into(),
            hash: "nope".into(),
            size: 0,
            kind: 2,
            target: String::new(),
        };
        assert!(matches!(link.into_entry(), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_pin_ls_stream() {
        let body = format!(
            "{{\"Cid\":\"{DIR}\",\"Name\":\"docs\",\"Type\":\"recursive\"}}\n\
             {{\"Cid\":\"{FILE}\",\"Name\":\"\",\"Type\":\"indirect\"}}\n\
             not json\n\n"
        );
        let lines = ndjson::<PinLsLine>(body.as_bytes());
        assert_eq!(lines.len(), 3);
        let records: Vec<_> = lines
            .into_iter()
            .take(2)
            .map(|l| l.unwrap().into_record().unwrap())
            .collect();
        assert_eq!(records[0].kind, PinKind::Direct);
        assert_eq!(records[0].name, "docs");
        assert_eq!(records[1].kind, PinKind::Indirect);

        let lines = ndjson::<PinLsLine>(body.as_bytes());
        assert!(matches!(lines[2], Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_pin_ls_keys() {
        let body = format!(r#"{{"Keys":{{"{FILE}":{{"Type":"indirect through {DIR}"}}}}}}"#);
        let res: PinLsRes = serde_json::from_str(&body).unwrap();
        assert_eq!(pin_kind(&res.keys[FILE].kind), PinKind::Indirect);
        assert_eq!(pin_kind("recursive"), PinKind::Direct);
    }

    #[test]
    fn test_gc_lines() {
        let body = format!("{{\"Key\":{{\"/\":\"{FILE}\"}}}}\n{{\"Error\":\"disk on fire\"}}\n");
        let lines = ndjson::<GcLine>(body.as_bytes());
        let first = lines[0].as_ref().unwrap();
        assert_eq!(first.key.as_ref().unwrap().cid, FILE);
        assert!(first.error.is_empty());
        assert_eq!(lines[1].as_ref().unwrap().error, "disk on fire");
    }

    #[test]
    fn test_swarm_peers() {
        let body = r#"{"Peers":[{"Addr":"/ip4/1.2.3.4/tcp/4001","Peer":"12D3KooWA","Latency":"23.5ms","Direction":2}]}"#;
        let res: SwarmPeersRes = serde_json::from_str(body).unwrap();
        let peer: PeerInfo = res.peers.unwrap().remove(0).into();
        assert_eq!(peer.direction, Direction::Outbound);
        assert_eq!(peer.latency, Some(Duration::from_micros(23_500)));

        let res: SwarmPeersRes = serde_json::from_str(r#"{"Peers":null}"#).unwrap();
        assert!(res.peers.is_none());
    }

    #[test]
    fn test_id_and_ping() {
        let body = r#"{"ID":"12D3KooWA","PublicKey":"CAES","Addresses":null,"AgentVersion":"kubo/0.29.0","Protocols":["/ipfs/id/1.0.0"]}"#;
        let info: NodeInfo = serde_json::from_str::<IdRes>(body).unwrap().into();
        assert_eq!(info.id, "12D3KooWA");
        assert!(info.addresses.is_empty());
        assert_eq!(info.protocols, ["/ipfs/id/1.0.0"]);

        let ping: PingResult = serde_json::from_str::<PingLine>(
            r#"{"Success":true,"Time":1500000,"Text":""}"#,
        )
        .unwrap()
        .into();
        assert_eq!(ping.time, Duration::from_micros(1500));
    }

    #[test]
    fn test_go_durations() {
        assert_eq!(parse_go_duration("0s"), Some(Duration::ZERO));
        assert_eq!(parse_go_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_go_duration("830µs"), Some(Duration::from_micros(830)));
        assert_eq!(parse_go_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_go_duration("1m2s"), Some(Duration::from_secs(62)));
        assert_eq!(parse_go_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_go_duration("n/a"), None);
        assert_eq!(parse_go_duration(""), None);
        assert_eq!(parse_go_duration("5 parsecs"), None);
    }
}
