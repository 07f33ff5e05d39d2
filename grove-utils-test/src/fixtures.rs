// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! On-disk directory fixtures.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt as _;
use std::path::Path;

/// What to create at a path below the fixture root.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    File(&'a [u8]),
    Executable(&'a [u8]),
    Symlink(&'a str),
    Dir,
}

/// Create every node below `root`, making parent directories as needed.
pub fn write_tree(root: &Path, nodes: &[(&str, Node<'_>)]) -> io::Result<()> {
    for (path, node) in nodes {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        match node {
            Node::File(content) => fs::write(&target, content)?,
            Node::Executable(content) => {
                fs::write(&target, content)?;
                fs::set_permissions(&target, fs::Permissions::from_mode(0o755))?;
            }
            Node::Symlink(link) => std::os::unix::fs::symlink(link, &target)?,
            Node::Dir => fs::create_dir_all(&target)?,
        }
    }
    Ok(())
}
