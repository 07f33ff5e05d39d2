// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Test utilities for Grove.
//!
//! This crate provides proptest strategies, on-disk fixtures and macros for
//! testing Grove crates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use tempfile::TempDir;

pub mod fixtures;

/// A wrapper around TempDir that provides a canonicalized path.
/// This resolves symlinks like /var -> /private/var on macOS, so paths
/// recorded by a walk compare equal to the ones a test builds.
pub struct CanonicalTempDir {
    _inner: TempDir,
    path: PathBuf,
}

impl CanonicalTempDir {
    /// Create a new temporary directory with a canonicalized path.
    pub fn new() -> std::io::Result<Self> {
        let inner = TempDir::new()?;
        let path = inner.path().canonicalize()?;
        Ok(Self {
            _inner: inner,
            path,
        })
    }

    /// Get the canonicalized path to the temporary directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn arb_filename() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._+=-]{1,12}".prop_filter("Not cur and parent dir", |s| s != "." && s != "..")
}

prop_compose! {
    /// A relative, `/`-separated path of one to four components.
    pub fn arb_path()(components in prop::collection::vec(arb_filename(), 1..5)) -> String {
        components.join("/")
    }
}

/// One regular file of a generated tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    pub content: Vec<u8>,
    pub executable: bool,
    /// Whether the file should be marked `export-ignore`.
    pub ignored: bool,
}

prop_compose! {
    pub fn arb_tree_file()(
        content in prop::collection::vec(any::<u8>(), 0..64),
        executable in any::<bool>(),
        ignored in prop::bool::weighted(0.3),
    ) -> TreeFile {
        TreeFile { content, executable, ignored }
    }
}

/// A set of files keyed by path, with no path being a prefix directory of
/// another file.
pub fn arb_file_tree(max_files: usize) -> impl Strategy<Value = BTreeMap<String, TreeFile>> {
    prop::collection::btree_map(arb_path(), arb_tree_file(), 1..max_files.max(2)).prop_map(
        |files| {
            let mut accepted: BTreeMap<String, TreeFile> = BTreeMap::new();
            for (path, file) in files {
                let conflicts = accepted.keys().any(|other| {
                    other.starts_with(&format!("{path}/")) || path.starts_with(&format!("{other}/"))
                });
                if !conflicts {
                    accepted.insert(path, file);
                }
            }
            accepted
        },
    )
}

#[macro_export]
macro_rules! pretty_prop_assert_eq {
    ($left:expr , $right:expr,) => ({
        $crate::pretty_prop_assert_eq!($left, $right)
    });
    ($left:expr , $right:expr) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                ::proptest::prop_assert!(*left_val == *right_val,
                    "assertion failed: `(left == right)`\
                          \n\
                          \n{}\
                          \n",
                          $crate::Comparison::new(left_val, right_val))
            }
        }
    });
    ($left:expr , $right:expr, $($arg:tt)*) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                ::proptest::prop_assert!(*left_val == *right_val,
                    "assertion failed: `(left == right)`: {}\
                          \n\
                          \n{}\
                          \n",
                           format_args!($($arg)*),
                           $crate::Comparison::new(left_val, right_val))
            }
        }
    });
}

#[doc(hidden)]
pub use pretty_assertions::Comparison;
