// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Path limiting for tree walks.

use bstr::{BString, ByteSlice as _};

use crate::error::{ArchiveError, ConfigError};
use crate::object::ObjectId;
use crate::tree::{TreeWalker, Visit};
use crate::wildmatch::{has_wildcard, literal_prefix_len, wildmatch};

/// How a path relates to a pathspec. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathMatch {
    /// Neither the path nor anything below it is selected.
    No,
    /// A directory that may contain selected paths.
    Leading,
    /// The path is selected, and with it everything below.
    Yes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Item {
    /// As given by the user, for diagnostics.
    original: String,
    /// Normalized: no leading `./`, no trailing `/`. Empty selects all.
    pattern: BString,
    wildcard: bool,
}

impl Item {
    fn parse(original: &str) -> Result<Item, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPathspec {
            pattern: original.to_owned(),
            reason: reason.to_owned(),
        };
        let mut pattern = original.as_bytes();
        if pattern.starts_with(b"/") {
            return Err(invalid("absolute paths are not allowed"));
        }
        while let Some(rest) = pattern.strip_prefix(b"./") {
            pattern = rest;
        }
        if pattern == b"." {
            pattern = b"";
        }
        while let Some(rest) = pattern.strip_suffix(b"/") {
            pattern = rest;
        }
        if pattern.split_str("/").any(|c| c == b"..") {
            return Err(invalid("'..' is outside the tree"));
        }
        Ok(Item {
            original: original.to_owned(),
            pattern: BString::from(pattern),
            wildcard: has_wildcard(pattern),
        })
    }

    fn matches(&self, path: &[u8], is_dir: bool) -> PathMatch {
        let pattern = self.pattern.as_slice();
        if pattern.is_empty() {
            return PathMatch::Yes;
        }
        if within(path, pattern) {
            return PathMatch::Yes;
        }
        if self.wildcard {
            if wildmatch(pattern, path, false) {
                return PathMatch::Yes;
            }
            let literal = &pattern[..literal_prefix_len(pattern)];
            if is_dir && (within_dir(literal, path) || dir_starts_with(path, literal)) {
                return PathMatch::Leading;
            }
        } else if is_dir && within_dir(pattern, path) {
            return PathMatch::Leading;
        }
        PathMatch::No
    }
}

/// `path` equals `prefix` or lies below it.
fn within(path: &[u8], prefix: &[u8]) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(b"/"))
}

/// `path` lies strictly below directory `dir`.
fn within_dir(path: &[u8], dir: &[u8]) -> bool {
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with(b"/"))
}

/// `dir + "/"` starts with `prefix`.
fn dir_starts_with(dir: &[u8], prefix: &[u8]) -> bool {
    match prefix.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest == b"/",
        None => dir.starts_with(prefix),
    }
}

/// A set of path patterns; a path is selected if any item selects it.
///
/// Items are literal paths (selecting the path and everything below it) or
/// wildcard patterns matched against the whole path, where `*` also spans
/// `/`. The empty pathspec selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pathspec {
    items: Vec<Item>,
}

impl Pathspec {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items = patterns
            .into_iter()
            .map(|p| Item::parse(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The items as the user wrote them.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.original.as_str())
    }

    pub fn matches(&self, path: &[u8], is_dir: bool) -> PathMatch {
        self.items
            .iter()
            .map(|item| item.matches(path, is_dir))
            .max()
            .unwrap_or(PathMatch::Yes)
    }

    fn single(&self, index: usize) -> Pathspec {
        Pathspec {
            items: self.items[index..=index].to_vec(),
        }
    }
}

/// Fail unless every item of `pathspec` selects at least one path in `tree`.
/// Empty items select everything and are not checked.
pub fn check_pathspec(
    trees: &dyn TreeWalker,
    tree: &ObjectId,
    pathspec: &Pathspec,
) -> Result<(), ArchiveError> {
    for (index, item) in pathspec.items.iter().enumerate() {
        if item.original.is_empty() {
            continue;
        }
        let single = pathspec.single(index);
        let mut found = false;
        trees.walk(tree, &single, &mut |entry| {
            let is_dir = entry.mode.is_dir();
            if is_dir && single.matches(&entry.path(), true) == PathMatch::Leading {
                return Ok(Visit::Recurse);
            }
            found = true;
            Ok(Visit::Skip)
        })?;
        if !found {
            return Err(ConfigError::PathspecNoMatch(item.original.clone()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod unittests {
    use super::*;
    use crate::tree::{MemoryTree, TreeBuilder};
    use rstest::rstest;

    #[rstest]
    #[case("docs", "docs", true, PathMatch::Yes)]
    #[case("docs", "docs/readme.txt", false, PathMatch::Yes)]
    #[case("docs/", "docs/readme.txt", false, PathMatch::Yes)]
    #[case("./docs", "docs", true, PathMatch::Yes)]
    #[case("docs", "docsx", false, PathMatch::No)]
    #[case("docs/readme.txt", "docs", true, PathMatch::Leading)]
    #[case("docs/readme.txt", "docs", false, PathMatch::No)]
    #[case("*.txt", "docs/readme.txt", false, PathMatch::Yes)]
    #[case("*.txt", "docs", true, PathMatch::Leading)]
    #[case("*.txt", "main.rs", false, PathMatch::No)]
    #[case("src/*.rs", "src", true, PathMatch::Leading)]
    #[case("src/*.rs", "docs", true, PathMatch::No)]
    #[case("sr*", "src", true, PathMatch::Yes)]
    #[case(".", "anything/at/all", false, PathMatch::Yes)]
    fn item_matches(
        #[case] pattern: &str,
        #[case] path: &str,
        #[case] is_dir: bool,
        #[case] expected: PathMatch,
    ) {
        let pathspec = Pathspec::new([pattern]).unwrap();
        assert_eq!(pathspec.matches(path.as_bytes(), is_dir), expected);
    }

    #[test]
    fn best_item_wins() {
        let pathspec = Pathspec::new(["a/b", "a"]).unwrap();
        assert_eq!(pathspec.matches(b"a", true), PathMatch::Yes);
        assert_eq!(Pathspec::default().matches(b"x", false), PathMatch::Yes);
    }

    #[test]
    fn rejects_paths_outside_the_tree() {
        assert!(matches!(
            Pathspec::new(["/etc"]),
            Err(ConfigError::InvalidPathspec { .. })
        ));
        assert!(matches!(
            Pathspec::new(["a/../b"]),
            Err(ConfigError::InvalidPathspec { .. })
        ));
    }

    #[test]
    fn every_item_must_match() {
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new()
            .file("docs/readme.txt", "r")
            .file("src/main.rs", "m")
            .build(&mut store);

        let ok = Pathspec::new(["docs/readme.txt", "src", "*.rs"]).unwrap();
        check_pathspec(&store, &root, &ok).unwrap();

        let missing = Pathspec::new(["docs", "nope/file"]).unwrap();
        let err = check_pathspec(&store, &root, &missing).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pathspec 'nope/file' did not match any files"
        );
    }

    #[test]
    fn empty_items_are_not_checked() {
        let mut store = MemoryTree::new();
        let empty = TreeBuilder::new().build(&mut store);
        let pathspec = Pathspec::new([""]).unwrap();
        assert_eq!(pathspec.matches(b"any/path", false), PathMatch::Yes);
        check_pathspec(&store, &empty, &pathspec).unwrap();

        let root = TreeBuilder::new().file("a", "a").build(&mut store);
        let mixed = Pathspec::new(["", "a"]).unwrap();
        check_pathspec(&store, &root, &mixed).unwrap();
    }
}
