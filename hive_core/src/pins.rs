use cid::Cid;
use std::fmt;

/// Why an object is retained by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PinKind {
    /// Explicitly pinned (the whole DAG below it is retained).
    Direct,
    /// Retained only because a direct pin reaches it.
    Indirect,
    None,
}

impl PinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinKind::Direct => "direct",
            PinKind::Indirect => "indirect",
            PinKind::None => "none",
        }
    }
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a pin listing. Pins are not deduplicated by identifier:
/// the same object pinned under two names yields two records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinRecord {
    pub cid: Cid,
    /// Human-readable name; empty for indirect records.
    pub name: String,
    pub kind: PinKind,
}

/// Answer of a pin status query as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinStatus {
    pub pinned: bool,
    /// Store-provided reason, e.g. `recursive` or `indirect through <cid>`.
    pub detail: String,
}

impl PinStatus {
    pub fn not_pinned() -> Self {
        Self {
            pinned: false,
            detail: "not pinned".to_owned(),
        }
    }

    pub fn direct(detail: impl Into<String>) -> Self {
        Self {
            pinned: true,
            detail: detail.into(),
        }
    }

    /// Status of an object reachable from the direct pin `parent`.
    pub fn indirect_through(parent: &Cid) -> Self {
        Self {
            pinned: true,
            detail: format!("indirect through {parent}"),
        }
    }

    pub fn kind(&self) -> PinKind {
        if !self.pinned {
            PinKind::None
        } else if self.detail.contains("indirect") {
            PinKind::Indirect
        } else {
            PinKind::Direct
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(PinStatus::not_pinned().kind(), PinKind::None);
        assert_eq!(PinStatus::direct("recursive").kind(), PinKind::Direct);
        assert_eq!(PinStatus::direct("direct").kind(), PinKind::Direct);

        let parent: Cid = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku"
            .parse()
            .unwrap();
        let status = PinStatus::indirect_through(&parent);
        assert_eq!(status.kind(), PinKind::Indirect);
        assert!(status.detail.ends_with(&parent.to_string()));
    }

    #[test]
    fn test_unpinned_detail_is_ignored() {
        let status = PinStatus {
            pinned: false,
            detail: "indirect through nothing".into(),
        };
        assert_eq!(status.kind(), PinKind::None);
    }
}
