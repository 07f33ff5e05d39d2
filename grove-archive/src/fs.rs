// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Snapshot a directory on disk into a [`MemoryTree`].
//!
//! Regular files keep only their executable bit, symlinks store their target
//! as blob content and `.git` directories are left out.

use std::fs;
use std::os::unix::ffi::OsStrExt as _;
use std::os::unix::fs::PermissionsExt as _;
use std::path::Path;

use bytes::Bytes;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::object::{FileMode, ObjectId};
use crate::tree::{MemoryTree, TreeBuilder};

fn io_error(path: &Path, source: impl Into<std::io::Error>) -> StoreError {
    StoreError::Io {
        path: path.to_owned(),
        source: source.into(),
    }
}

/// Read everything below `root` and store it, returning the root tree id.
pub fn load_dir(root: &Path) -> Result<(MemoryTree, ObjectId), StoreError> {
    let mut builder = TreeBuilder::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_owned();
            io_error(&path, e)
        })?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let key = relative.as_os_str().as_bytes();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            builder.dir_node(key);
        } else if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| io_error(path, e))?;
            builder.leaf(
                key,
                FileMode::SYMLINK,
                Bytes::copy_from_slice(target.as_os_str().as_bytes()),
            );
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|e| io_error(path, e))?;
            let mode = if metadata.permissions().mode() & 0o111 != 0 {
                FileMode::EXECUTABLE
            } else {
                FileMode::REGULAR
            };
            let content = fs::read(path).map_err(|e| io_error(path, e))?;
            builder.leaf(key, mode, Bytes::from(content));
        } else {
            return Err(StoreError::UnsupportedFileType(path.to_owned()));
        }
    }

    let mut store = MemoryTree::new();
    let tree = builder.build(&mut store);
    debug!(root = %root.display(), %tree, objects = store.len(), "loaded directory");
    Ok((store, tree))
}
