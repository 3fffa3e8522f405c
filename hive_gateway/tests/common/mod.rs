#![allow(dead_code)]

use hive_gateway::Gateway;
use hive_store_memory::MemoryStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn setup() -> (Arc<MemoryStore>, Gateway) {
    let store = Arc::new(MemoryStore::new());
    let gateway = Gateway::from_arc(store.clone());
    (store, gateway)
}

/// Creates `files` (relative path, contents) below `root`.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, body) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }
}

/// Every regular file below `root`, keyed by path relative to `root`.
pub fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if entry.file_type().unwrap().is_dir() {
                dirs.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    files
}
