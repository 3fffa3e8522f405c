//! Wrapping local files and directories as uploadable nodes.

use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::node::NodeKind;

/// A local file or directory tree ready for submission to a store.
///
/// File contents are not read here; the store streams them from `source`
/// during submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadNode {
    File {
        name: String,
        source: PathBuf,
        size: u64,
    },
    Directory {
        name: String,
        /// Children sorted by name.
        entries: Vec<UploadNode>,
    },
    Symlink {
        name: String,
        target: String,
    },
}

impl UploadNode {
    /// Wraps `path` as a node, preserving the directory hierarchy.
    ///
    /// Entries whose name starts with `.` are skipped below the root unless
    /// `include_hidden` is set. A symlink at `path` itself is followed;
    /// symlinks below it are kept as links. Special files (sockets, fifos,
    /// devices) are skipped.
    ///
    /// This walks the filesystem synchronously; call it from a blocking
    /// context.
    pub fn from_path(path: &Path, include_hidden: bool) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let name = root_name(path)?;

        if meta.is_file() {
            return Ok(UploadNode::File {
                name,
                source: path.to_path_buf(),
                size: meta.len(),
            });
        }
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is neither a file nor a directory", path.display()),
            ));
        }

        // Pre-order walk; `open[d]` is the directory currently being filled
        // at depth `d`.
        let mut open = vec![UploadNode::Directory {
            name,
            entries: Vec::new(),
        }];

        let walker = WalkDir::new(path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || include_hidden || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            while open.len() > entry.depth() {
                close_top(&mut open);
            }

            let name = entry
                .file_name()
                .to_str()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("file name is not valid UTF-8: {:?}", entry.path()),
                    )
                })?
                .to_owned();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                open.push(UploadNode::Directory {
                    name,
                    entries: Vec::new(),
                });
                continue;
            }

            let node = if file_type.is_symlink() {
                UploadNode::Symlink {
                    name,
                    target: link_target(entry.path())?,
                }
            } else if file_type.is_file() {
                let size = entry.metadata().map_err(io::Error::from)?.len();
                UploadNode::File {
                    name,
                    source: entry.path().to_path_buf(),
                    size,
                }
            } else {
                tracing::debug!("skipping special file {:?}", entry.path());
                continue;
            };
            if let Some(UploadNode::Directory { entries, .. }) = open.last_mut() {
                entries.push(node);
            }
        }

        while open.len() > 1 {
            close_top(&mut open);
        }
        open.pop()
            .ok_or_else(|| io::Error::other("directory walk lost its root"))
    }

    pub fn name(&self) -> &str {
        match self {
            UploadNode::File { name, .. }
            | UploadNode::Directory { name, .. }
            | UploadNode::Symlink { name, .. } => name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            UploadNode::File { .. } => NodeKind::File,
            UploadNode::Directory { .. } => NodeKind::Directory,
            UploadNode::Symlink { .. } => NodeKind::Symlink,
        }
    }

    /// Sum of all file sizes in the tree.
    pub fn total_size(&self) -> u64 {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                UploadNode::File { size, .. } => total += size,
                UploadNode::Directory { entries, .. } => stack.extend(entries),
                UploadNode::Symlink { .. } => {}
            }
        }
        total
    }
}

fn close_top(open: &mut Vec<UploadNode>) {
    if let Some(done) = open.pop()
        && let Some(UploadNode::Directory { entries, .. }) = open.last_mut()
    {
        entries.push(done);
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn root_name(path: &Path) -> io::Result<String> {
    let name = match path.file_name() {
        Some(name) => name.to_os_string(),
        // `.`, `..` or `/`: name the node after the resolved directory.
        None => path
            .canonicalize()?
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default(),
    };
    name.into_string().map_err(|raw| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("file name is not valid UTF-8: {raw:?}"),
        )
    })
}

fn link_target(path: &Path) -> io::Result<String> {
    let target = std::fs::read_link(path)?;
    target.into_os_string().into_string().map_err(|raw| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("symlink target is not valid UTF-8: {raw:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(entries: &[UploadNode]) -> Vec<&str> {
        entries.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        fs::write(&file, b"hello").unwrap();

        let node = UploadNode::from_path(&file, false).unwrap();
        assert_eq!(
            node,
            UploadNode::File {
                name: "hello.txt".into(),
                source: file,
                size: 5,
            }
        );
    }

    #[test]
    fn test_directory_hierarchy_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("b.txt"), b"bb").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("sub/c.txt"), b"ccc").unwrap();
        fs::write(root.join("sub/deeper/d.txt"), b"dddd").unwrap();
        fs::write(root.join("z.txt"), b"z").unwrap();

        let node = UploadNode::from_path(&root, false).unwrap();
        let UploadNode::Directory { name, entries } = &node else {
            panic!("expected a directory, got {node:?}");
        };
        assert_eq!(name, "docs");
        assert_eq!(names(entries), ["a.txt", "b.txt", "sub", "z.txt"]);

        let UploadNode::Directory { entries: sub, .. } = &entries[2] else {
            panic!("expected sub to be a directory");
        };
        assert_eq!(names(sub), ["c.txt", "deeper"]);
        let UploadNode::Directory { entries: deeper, .. } = &sub[1] else {
            panic!("expected deeper to be a directory");
        };
        assert_eq!(names(deeper), ["d.txt"]);
        assert_eq!(node.total_size(), 1 + 2 + 3 + 4 + 1);
    }

    #[test]
    fn test_hidden_entries_are_skipped_by_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".secret"), b"s").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), b"ref").unwrap();
        fs::write(dir.path().join("visible"), b"v").unwrap();

        let UploadNode::Directory { entries, .. } =
            UploadNode::from_path(dir.path(), false).unwrap()
        else {
            panic!("expected a directory");
        };
        assert_eq!(names(&entries), ["visible"]);

        let UploadNode::Directory { entries, .. } =
            UploadNode::from_path(dir.path(), true).unwrap()
        else {
            panic!("expected a directory");
        };
        assert_eq!(names(&entries), [".git", ".secret", "visible"]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("empty");
        fs::create_dir(&root).unwrap();
        let node = UploadNode::from_path(&root, false).unwrap();
        assert_eq!(
            node,
            UploadNode::Directory {
                name: "empty".into(),
                entries: vec![],
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("target.txt"), b"t").unwrap();
        std::os::unix::fs::symlink("target.txt", dir.path().join("link")).unwrap();

        let UploadNode::Directory { entries, .. } =
            UploadNode::from_path(dir.path(), false).unwrap()
        else {
            panic!("expected a directory");
        };
        assert_eq!(
            entries[0],
            UploadNode::Symlink {
                name: "link".into(),
                target: "target.txt".into(),
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_root_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), b"real").unwrap();
        fs::create_dir(dir.path().join("real-dir")).unwrap();
        fs::write(dir.path().join("real-dir/inner.txt"), b"inner").unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("link.txt")).unwrap();
        std::os::unix::fs::symlink("real-dir", dir.path().join("link-dir")).unwrap();

        let node = UploadNode::from_path(&dir.path().join("link.txt"), false).unwrap();
        assert_eq!(
            node,
            UploadNode::File {
                name: "link.txt".into(),
                source: dir.path().join("link.txt"),
                size: 4,
            }
        );

        let UploadNode::Directory { name, entries } =
            UploadNode::from_path(&dir.path().join("link-dir"), false).unwrap()
        else {
            panic!("expected a directory");
        };
        assert_eq!(name, "link-dir");
        assert_eq!(names(&entries), ["inner.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_root() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("gone.txt", dir.path().join("dangling")).unwrap();
        let err = UploadNode::from_path(&dir.path().join("dangling"), false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadNode::from_path(&dir.path().join("nope"), false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
