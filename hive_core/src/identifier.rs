//! Content identifiers and the immutable path form used by every other
//! operation.
//!
//! A raw identifier is a CID string (`bafy...` for v1, `Qm...` for v0).
//! The canonical path form is `/<namespace>/<cid>[/<segment>...]`, where the
//! namespace is `ipfs` (UnixFS view) or `ipld` (raw DAG view).

use cid::Cid;
use std::fmt;
use std::str::FromStr;

/// Errors raised while decoding an identifier or an immutable path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("not a content identifier: {0}")]
    Cid(String),
    #[error("path must start with '/'")]
    NotAbsolute,
    #[error("unsupported namespace {0:?}: expected \"ipfs\" or \"ipld\"")]
    Namespace(String),
    #[error("path has no root identifier")]
    MissingRoot,
    #[error("invalid path segment {0:?}")]
    Segment(String),
}

/// Namespace prefix of an immutable path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Ipfs,
    Ipld,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Ipfs => "ipfs",
            Namespace::Ipld => "ipld",
        }
    }

    fn parse(s: &str) -> Result<Self, IdentifierError> {
        match s {
            "ipfs" => Ok(Namespace::Ipfs),
            "ipld" => Ok(Namespace::Ipld),
            other => Err(IdentifierError::Namespace(other.to_owned())),
        }
    }
}

/// An immutable, content-addressed path: a root CID plus an optional
/// sequence of link names below it.
///
/// ```
/// use hive_core::ImmutablePath;
///
/// let path: ImmutablePath =
///     "/ipfs/bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku/a.txt"
///         .parse()
///         .unwrap();
/// assert_eq!(path.segments(), ["a.txt"]);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImmutablePath {
    namespace: Namespace,
    root: Cid,
    segments: Vec<String>,
}

impl fmt::Debug for ImmutablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImmutablePath")
            .field(&self.to_string())
            .finish()
    }
}

impl ImmutablePath {
    /// The `/ipfs/<cid>` path of a root identifier.
    pub fn from_cid(root: Cid) -> Self {
        Self {
            namespace: Namespace::Ipfs,
            root,
            segments: Vec::new(),
        }
    }

    /// Parses `/<namespace>/<cid>[/<segment>...]`. A single trailing slash
    /// is tolerated; empty, `.` and `..` segments are not.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        if input.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let rest = input
            .strip_prefix('/')
            .ok_or(IdentifierError::NotAbsolute)?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut parts = rest.split('/');
        let namespace = Namespace::parse(parts.next().unwrap_or_default())?;
        let root = match parts.next() {
            Some(raw) if !raw.is_empty() => decode_cid(raw)?,
            _ => return Err(IdentifierError::MissingRoot),
        };

        let mut segments = Vec::new();
        for segment in parts {
            if !is_valid_segment(segment) {
                return Err(IdentifierError::Segment(segment.to_owned()));
            }
            segments.push(segment.to_owned());
        }

        Ok(Self {
            namespace,
            root,
            segments,
        })
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn root(&self) -> &Cid {
        &self.root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the path names the root object itself.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the path of a named child below this one.
    pub fn join(&self, name: &str) -> Result<Self, IdentifierError> {
        if !is_valid_segment(name) {
            return Err(IdentifierError::Segment(name.to_owned()));
        }
        let mut child = self.clone();
        child.segments.push(name.to_owned());
        Ok(child)
    }
}

impl fmt::Display for ImmutablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.namespace.as_str(), self.root)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for ImmutablePath {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImmutablePath::parse(s)
    }
}

/// Decodes a raw content identifier string.
pub fn decode_cid(identifier: &str) -> Result<Cid, IdentifierError> {
    if identifier.is_empty() {
        return Err(IdentifierError::Empty);
    }
    Cid::try_from(identifier).map_err(|e| IdentifierError::Cid(e.to_string()))
}

/// Converts a raw content identifier into its canonical `/ipfs/<cid>` path.
///
/// Pure: no network access and no side effects.
pub fn resolve_path(identifier: &str) -> Result<ImmutablePath, IdentifierError> {
    decode_cid(identifier).map(ImmutablePath::from_cid)
}

/// Whether `name` may appear as a single link name inside a directory.
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
