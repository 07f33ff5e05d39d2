// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Per-path export attributes.
//!
//! [`AttributeSource`] answers which export behavior applies to a path.
//! [`GitAttributes`] evaluates `.gitattributes` files, read either from the
//! archived tree or from a worktree on disk. [`AttributeFilter`] sits in
//! front of a source during a walk, caching answers and turning source
//! failures into plain attributes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bstr::{BStr, BString, ByteSlice as _};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::AttrError;
use crate::object::ObjectId;
use crate::tree::{ObjectStore, TreeWalker};
use crate::wildmatch::wildmatch;

pub const EXPORT_IGNORE: &str = "export-ignore";
pub const EXPORT_SUBST: &str = "export-subst";

const ATTRIBUTES_FILE: &str = ".gitattributes";

/// Export behavior of one path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveAttributes {
    /// Leave the path (and for directories, everything below) out.
    pub ignore: bool,
    /// Expand `$Format:...$` markers in the content.
    pub substitute: bool,
}

pub trait AttributeSource {
    fn check(&self, path: &[u8], is_dir: bool) -> Result<ArchiveAttributes, AttrError>;
}

impl<F> AttributeSource for F
where
    F: Fn(&[u8], bool) -> Result<ArchiveAttributes, AttrError>,
{
    fn check(&self, path: &[u8], is_dir: bool) -> Result<ArchiveAttributes, AttrError> {
        self(path, is_dir)
    }
}

/// Source with no attributes set anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttributes;

impl AttributeSource for NoAttributes {
    fn check(&self, _path: &[u8], _is_dir: bool) -> Result<ArchiveAttributes, AttrError> {
        Ok(ArchiveAttributes::default())
    }
}

/// Caching front of an [`AttributeSource`] for one walk.
pub struct AttributeFilter<'a> {
    source: &'a dyn AttributeSource,
    cache: HashMap<(BString, bool), ArchiveAttributes>,
}

impl<'a> AttributeFilter<'a> {
    pub fn new(source: &'a dyn AttributeSource) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    /// Attributes of `path`; a failing source yields the defaults.
    pub fn classify(&mut self, path: &[u8], is_dir: bool) -> ArchiveAttributes {
        let key = (BString::from(path), is_dir);
        if let Some(attrs) = self.cache.get(&key) {
            return *attrs;
        }
        let attrs = self.source.check(path, is_dir).unwrap_or_else(|err| {
            warn!(path = %path.as_bstr(), "ignoring attributes: {err}");
            ArchiveAttributes::default()
        });
        self.cache.insert(key, attrs);
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Set,
    Unset,
    Unspecified,
    Value(BString),
}

#[derive(Debug, Clone)]
struct Pattern {
    text: BString,
    /// Matched against the path relative to the attributes file; otherwise
    /// against the basename.
    anchored: bool,
    dir_only: bool,
}

impl Pattern {
    fn parse(raw: &[u8]) -> Pattern {
        let mut text = raw;
        let dir_only = text.len() > 1 && text.ends_with(b"/");
        if dir_only {
            text = &text[..text.len() - 1];
        }
        let anchored = text.contains(&b'/');
        let text = text.strip_prefix(b"/").unwrap_or(text);
        Pattern {
            text: BString::from(text),
            anchored,
            dir_only,
        }
    }

    fn matches(&self, relative: &[u8], is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.anchored {
            wildmatch(&self.text, relative, true)
        } else {
            let basename = match relative.rfind_byte(b'/') {
                Some(i) => &relative[i + 1..],
                None => relative,
            };
            wildmatch(&self.text, basename, true)
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    assignments: Vec<(BString, State)>,
}

impl Rule {
    fn state(&self, attr: &str) -> Option<&State> {
        self.assignments
            .iter()
            .rev()
            .find(|(name, _)| name == attr)
            .map(|(_, state)| state)
    }
}

fn parse_rules(content: &[u8]) -> Vec<Rule> {
    let mut rules = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(b"#") {
            continue;
        }
        let mut fields = line.fields();
        let Some(pattern) = fields.next() else {
            continue;
        };
        if pattern.starts_with(b"!") {
            warn!(
                pattern = %pattern.as_bstr(),
                "negative patterns are ignored in attribute files"
            );
            continue;
        }
        let assignments = fields
            .filter_map(|field| {
                let (name, state) = if let Some(name) = field.strip_prefix(b"-") {
                    (name, State::Unset)
                } else if let Some(name) = field.strip_prefix(b"!") {
                    (name, State::Unspecified)
                } else if let Some((name, value)) = field.split_once_str("=") {
                    (name, State::Value(BString::from(value)))
                } else {
                    (field, State::Set)
                };
                (!name.is_empty()).then(|| (BString::from(name), state))
            })
            .collect();
        rules.push(Rule {
            pattern: Pattern::parse(pattern),
            assignments,
        });
    }
    rules
}

/// Where attribute files are read from.
pub trait AttributeFiles {
    /// Content of the attributes file in `dir` (empty or `/`-terminated),
    /// if there is one.
    fn read(&self, dir: &[u8]) -> Result<Option<Bytes>, AttrError>;
}

/// Attribute files committed in a tree.
pub struct TreeAttributeFiles<'a> {
    pub trees: &'a dyn TreeWalker,
    pub objects: &'a dyn ObjectStore,
    pub tree: ObjectId,
}

impl AttributeFiles for TreeAttributeFiles<'_> {
    fn read(&self, dir: &[u8]) -> Result<Option<Bytes>, AttrError> {
        let mut path = BString::from(dir);
        path.extend_from_slice(ATTRIBUTES_FILE.as_bytes());
        match self.trees.lookup(&self.tree, &path)? {
            Some((oid, mode)) if mode.is_regular() => Ok(Some(self.objects.read_blob(&oid)?)),
            _ => Ok(None),
        }
    }
}

/// Attribute files in a checked-out directory.
#[derive(Debug, Clone)]
pub struct WorktreeAttributeFiles {
    root: PathBuf,
}

impl WorktreeAttributeFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AttributeFiles for WorktreeAttributeFiles {
    fn read(&self, dir: &[u8]) -> Result<Option<Bytes>, AttrError> {
        let path = self
            .root
            .join(Path::new(std::ffi::OsStr::from_bytes(dir)))
            .join(ATTRIBUTES_FILE);
        match fs::read(&path) {
            Ok(content) => Ok(Some(content.into())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(AttrError::Io { path, source }),
        }
    }
}

/// `.gitattributes` evaluation for `export-ignore` and `export-subst`.
///
/// Files closer to the path win over files further up, and within a file
/// later lines win over earlier ones. Parsed files are cached per directory.
pub struct GitAttributes<F> {
    files: F,
    parsed: RefCell<HashMap<Vec<u8>, Rc<[Rule]>>>,
}

impl<F: AttributeFiles> GitAttributes<F> {
    pub fn new(files: F) -> Self {
        Self {
            files,
            parsed: RefCell::new(HashMap::new()),
        }
    }

    fn rules(&self, dir: &BStr) -> Result<Rc<[Rule]>, AttrError> {
        if let Some(rules) = self.parsed.borrow().get(dir.as_bytes()) {
            return Ok(rules.clone());
        }
        let rules: Rc<[Rule]> = match self.files.read(dir)? {
            Some(content) => {
                let rules = parse_rules(&content);
                debug!(dir = %dir, rules = rules.len(), "loaded attributes");
                rules.into()
            }
            None => Rc::from(Vec::new()),
        };
        self.parsed
            .borrow_mut()
            .insert(dir.as_bytes().to_vec(), rules.clone());
        Ok(rules)
    }
}

impl<F: AttributeFiles> AttributeSource for GitAttributes<F> {
    fn check(&self, path: &[u8], is_dir: bool) -> Result<ArchiveAttributes, AttrError> {
        // directories that may hold a relevant attributes file, outermost first
        let mut dirs = vec![&path[..0]];
        dirs.extend(
            path.iter()
                .enumerate()
                .filter(|&(_, &b)| b == b'/')
                .map(|(i, _)| &path[..=i]),
        );

        let mut ignore = None;
        let mut substitute = None;
        for dir in dirs.into_iter().rev() {
            let rules = self.rules(dir.as_bstr())?;
            let relative = &path[dir.len()..];
            for rule in rules.iter().rev() {
                if ignore.is_some() && substitute.is_some() {
                    break;
                }
                if !rule.pattern.matches(relative, is_dir) {
                    continue;
                }
                if ignore.is_none() {
                    ignore = rule.state(EXPORT_IGNORE).cloned();
                }
                if substitute.is_none() {
                    substitute = rule.state(EXPORT_SUBST).cloned();
                }
            }
        }
        Ok(ArchiveAttributes {
            ignore: ignore == Some(State::Set),
            substitute: substitute == Some(State::Set),
        })
    }
}

#[cfg(test)]
mod unittests {
    use super::*;
    use crate::tree::{MemoryTree, TreeBuilder};
    use std::cell::Cell;

    struct Files(Vec<(&'static str, &'static str)>);

    impl AttributeFiles for Files {
        fn read(&self, dir: &[u8]) -> Result<Option<Bytes>, AttrError> {
            Ok(self
                .0
                .iter()
                .find(|(d, _)| d.as_bytes() == dir)
                .map(|(_, content)| Bytes::from_static(content.as_bytes())))
        }
    }

    fn attrs(ignore: bool, substitute: bool) -> ArchiveAttributes {
        ArchiveAttributes { ignore, substitute }
    }

    #[test]
    fn basename_and_anchored_patterns() {
        let source = GitAttributes::new(Files(vec![(
            "",
            "*.bin export-ignore\n/top.txt export-subst\ndocs/*.md export-subst\n",
        )]));
        assert_eq!(source.check(b"docs/secret.bin", false).unwrap(), attrs(true, false));
        assert_eq!(source.check(b"top.txt", false).unwrap(), attrs(false, true));
        assert_eq!(source.check(b"sub/top.txt", false).unwrap(), attrs(false, false));
        assert_eq!(source.check(b"docs/a.md", false).unwrap(), attrs(false, true));
        assert_eq!(source.check(b"docs/x/a.md", false).unwrap(), attrs(false, false));
    }

    #[test]
    fn later_lines_and_deeper_files_win() {
        let source = GitAttributes::new(Files(vec![
            ("", "*.txt export-ignore\nkeep.txt -export-ignore\n"),
            ("docs/", "*.txt !export-ignore export-subst\n"),
        ]));
        assert_eq!(source.check(b"a.txt", false).unwrap(), attrs(true, false));
        assert_eq!(source.check(b"keep.txt", false).unwrap(), attrs(false, false));
        // unspecified in docs/ overrides the root rule
        assert_eq!(source.check(b"docs/a.txt", false).unwrap(), attrs(false, true));
    }

    #[test]
    fn trailing_slash_matches_directories_only() {
        let source = GitAttributes::new(Files(vec![("", "build/ export-ignore\n")]));
        assert_eq!(source.check(b"build", true).unwrap(), attrs(true, false));
        assert_eq!(source.check(b"build", false).unwrap(), attrs(false, false));
    }

    #[test]
    fn comments_values_and_negations() {
        let rules = parse_rules(b"# comment\n\n!neg export-ignore\nx export-ignore=yes\n");
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].state(EXPORT_IGNORE),
            Some(&State::Value(BString::from("yes")))
        );
    }

    #[test]
    fn reads_files_from_a_tree() {
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new()
            .file(".gitattributes", "secret.bin export-ignore\n")
            .file("docs/.gitattributes", "*.txt export-subst\n")
            .file("docs/readme.txt", "hi")
            .build(&mut store);
        let source = GitAttributes::new(TreeAttributeFiles {
            trees: &store,
            objects: &store,
            tree: root,
        });
        assert_eq!(source.check(b"docs/secret.bin", false).unwrap(), attrs(true, false));
        assert_eq!(source.check(b"docs/readme.txt", false).unwrap(), attrs(false, true));
        assert_eq!(source.check(b"readme.txt", false).unwrap(), attrs(false, false));
    }

    #[test]
    fn reads_files_from_a_worktree() {
        let dir = grove_utils_test::CanonicalTempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/.gitattributes"), "* export-ignore\n").unwrap();
        let source = GitAttributes::new(WorktreeAttributeFiles::new(dir.path()));
        assert_eq!(source.check(b"sub/file", false).unwrap(), attrs(true, false));
        assert_eq!(source.check(b"file", false).unwrap(), attrs(false, false));
    }

    #[test]
    fn filter_caches_and_recovers() {
        let calls = Cell::new(0);
        let failing = |path: &[u8], _is_dir: bool| {
            calls.set(calls.get() + 1);
            if path == b"bad" {
                Err(AttrError::Io {
                    path: PathBuf::from("bad"),
                    source: io::Error::other("unreadable"),
                })
            } else {
                Ok(attrs(true, false))
            }
        };
        let mut filter = AttributeFilter::new(&failing);
        assert_eq!(filter.classify(b"bad", false), attrs(false, false));
        assert_eq!(filter.classify(b"good", true), attrs(true, false));
        assert_eq!(filter.classify(b"good", true), attrs(true, false));
        assert_eq!(calls.get(), 2);
    }
}
