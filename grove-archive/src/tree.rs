// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Tree objects and the enumerator that walks them.
//!
//! A tree is a sorted list of `(mode, name, object id)` entries. The
//! enumerator visits entries depth-first in tree order and asks the visitor
//! whether to descend into each directory.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use bstr::{BStr, BString, ByteSlice as _};
use bytes::Bytes;

use crate::error::{ArchiveError, ConfigError, StoreError};
use crate::object::{FileMode, ObjectId};
use crate::pathspec::{PathMatch, Pathspec};

/// Read access to blob content.
pub trait ObjectStore {
    fn read_blob(&self, oid: &ObjectId) -> Result<Bytes, StoreError>;
}

/// Answer of a visitor for one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Skip,
    Recurse,
}

/// One node as seen by the visitor.
#[derive(Debug, Clone, Copy)]
pub struct VisitEntry<'a> {
    pub oid: ObjectId,
    /// Path of the containing directory, empty or ending in `/`.
    pub base: &'a BStr,
    pub name: &'a BStr,
    pub mode: FileMode,
    pub stage: u32,
}

impl VisitEntry<'_> {
    /// `base` followed by `name`.
    pub fn path(&self) -> BString {
        let mut path = BString::from(Vec::with_capacity(self.base.len() + self.name.len()));
        path.extend_from_slice(self.base);
        path.extend_from_slice(self.name);
        path
    }
}

pub type Visitor<'v> = dyn FnMut(&VisitEntry<'_>) -> Result<Visit, ArchiveError> + 'v;

/// Depth-first enumeration of tree objects.
pub trait TreeWalker {
    /// Visit every node of `tree` selected by `pathspec`, in tree order.
    ///
    /// Directories that can only contain matches are visited too; the
    /// visitor decides whether to descend. An error from the visitor stops
    /// the walk and is returned.
    fn walk(
        &self,
        tree: &ObjectId,
        pathspec: &Pathspec,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), ArchiveError>;

    /// Resolve a `/`-separated path below `tree`. The empty path names the
    /// tree itself.
    fn lookup(&self, tree: &ObjectId, path: &[u8])
    -> Result<Option<(ObjectId, FileMode)>, StoreError>;

    /// Resolve `path` to a directory to be used as the archive root.
    fn subtree(&self, tree: &ObjectId, path: &[u8]) -> Result<ObjectId, ArchiveError> {
        match self.lookup(tree, path)? {
            Some((oid, mode)) if mode.is_dir() => Ok(oid),
            _ => Err(ConfigError::NotADirectory(path.into()).into()),
        }
    }
}

/// One entry of a stored tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: BString,
    pub mode: FileMode,
    pub oid: ObjectId,
}

/// Tree order: names compare bytewise, directories as if followed by `/`.
pub fn tree_order(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    fn key(entry: &TreeEntry) -> impl Iterator<Item = u8> + '_ {
        let slash = entry.mode.is_dir().then_some(b'/');
        entry.name.iter().copied().chain(slash)
    }
    key(a).cmp(key(b))
}

#[derive(Debug, Clone)]
enum Object {
    Blob(Bytes),
    Tree(Vec<TreeEntry>),
}

/// Objects held in memory, addressed like git addresses them.
#[derive(Debug, Default, Clone)]
pub struct MemoryTree {
    objects: HashMap<ObjectId, Object>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_blob(&mut self, data: impl Into<Bytes>) -> ObjectId {
        let data = data.into();
        let oid = ObjectId::for_blob(&data);
        self.objects.entry(oid).or_insert(Object::Blob(data));
        oid
    }

    /// Store a tree object. Entries are sorted into tree order first.
    pub fn insert_tree(&mut self, mut entries: Vec<TreeEntry>) -> ObjectId {
        entries.sort_by(tree_order);
        let mut encoded = Vec::new();
        for entry in &entries {
            encoded.extend_from_slice(entry.mode.tree_bytes().as_bytes());
            encoded.push(b' ');
            encoded.extend_from_slice(&entry.name);
            encoded.push(0);
            encoded.extend_from_slice(entry.oid.as_bytes());
        }
        let oid = ObjectId::hash_object("tree", &encoded);
        self.objects.entry(oid).or_insert(Object::Tree(entries));
        oid
    }

    pub fn tree_entries(&self, oid: &ObjectId) -> Result<&[TreeEntry], StoreError> {
        match self.objects.get(oid) {
            Some(Object::Tree(entries)) => Ok(entries),
            Some(Object::Blob(_)) => Err(StoreError::NotATree(*oid)),
            None => Err(StoreError::Missing(*oid)),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn walk_tree(
        &self,
        tree: &ObjectId,
        base: &mut BString,
        pathspec: &Pathspec,
        matched: bool,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), ArchiveError> {
        for entry in self.tree_entries(tree)? {
            let base_len = base.len();
            let is_dir = entry.mode.is_dir();

            let mut inside = matched;
            if !matched {
                base.extend_from_slice(&entry.name);
                let answer = pathspec.matches(base.as_slice(), is_dir);
                base.truncate(base_len);
                match answer {
                    PathMatch::No => continue,
                    PathMatch::Leading => inside = false,
                    PathMatch::Yes => inside = true,
                }
            }

            let visit = visitor(&VisitEntry {
                oid: entry.oid,
                base: base.as_bstr(),
                name: entry.name.as_bstr(),
                mode: entry.mode,
                stage: 0,
            })?;

            if is_dir && visit == Visit::Recurse {
                base.extend_from_slice(&entry.name);
                base.push(b'/');
                let result = self.walk_tree(&entry.oid, base, pathspec, inside, visitor);
                base.truncate(base_len);
                result?;
            }
        }
        Ok(())
    }
}

impl ObjectStore for MemoryTree {
    fn read_blob(&self, oid: &ObjectId) -> Result<Bytes, StoreError> {
        match self.objects.get(oid) {
            Some(Object::Blob(data)) => Ok(data.clone()),
            Some(Object::Tree(_)) => Err(StoreError::NotABlob(*oid)),
            None => Err(StoreError::Missing(*oid)),
        }
    }
}

impl TreeWalker for MemoryTree {
    fn walk(
        &self,
        tree: &ObjectId,
        pathspec: &Pathspec,
        visitor: &mut Visitor<'_>,
    ) -> Result<(), ArchiveError> {
        let mut base = BString::default();
        self.walk_tree(tree, &mut base, pathspec, pathspec.is_empty(), visitor)
    }

    fn lookup(
        &self,
        tree: &ObjectId,
        path: &[u8],
    ) -> Result<Option<(ObjectId, FileMode)>, StoreError> {
        let mut current = (*tree, FileMode::DIRECTORY);
        for component in path.split_str("/").filter(|c| !c.is_empty()) {
            if !current.1.is_dir() {
                return Ok(None);
            }
            let entries = self.tree_entries(&current.0)?;
            match entries.iter().find(|e| e.name.as_slice() == component) {
                Some(entry) => current = (entry.oid, entry.mode),
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf { mode: FileMode, content: Bytes },
    Gitlink(ObjectId),
    Dir(BTreeMap<BString, Node>),
}

/// Builds nested trees from `/`-separated paths.
///
/// Intermediate directories are created on demand; adding a path twice
/// replaces the earlier node.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    root: BTreeMap<BString, Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            root: BTreeMap::new(),
        }
    }

    pub fn file(&mut self, path: &str, content: impl Into<Bytes>) -> &mut Self {
        self.leaf(path.as_bytes(), FileMode::REGULAR, content.into())
    }

    pub fn executable(&mut self, path: &str, content: impl Into<Bytes>) -> &mut Self {
        self.leaf(path.as_bytes(), FileMode::EXECUTABLE, content.into())
    }

    pub fn symlink(&mut self, path: &str, target: &str) -> &mut Self {
        self.leaf(
            path.as_bytes(),
            FileMode::SYMLINK,
            Bytes::copy_from_slice(target.as_bytes()),
        )
    }

    pub fn gitlink(&mut self, path: &str, commit: ObjectId) -> &mut Self {
        self.insert(path.as_bytes(), Node::Gitlink(commit))
    }

    /// An (initially empty) directory.
    pub fn dir(&mut self, path: &str) -> &mut Self {
        self.dir_node(path.as_bytes());
        self
    }

    /// Add a node with an explicit mode, as the disk loader does.
    pub fn leaf(&mut self, path: &[u8], mode: FileMode, content: Bytes) -> &mut Self {
        self.insert(path, Node::Leaf { mode, content })
    }

    pub(crate) fn dir_node(&mut self, path: &[u8]) -> &mut BTreeMap<BString, Node> {
        let mut dir = &mut self.root;
        for component in path.split_str("/").filter(|c| !c.is_empty()) {
            let node = dir
                .entry(BString::from(component))
                .and_modify(|node| {
                    if !matches!(node, Node::Dir(_)) {
                        *node = Node::Dir(BTreeMap::new());
                    }
                })
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            dir = match node {
                Node::Dir(children) => children,
                _ => unreachable!("replaced by a directory above"),
            };
        }
        dir
    }

    fn insert(&mut self, path: &[u8], node: Node) -> &mut Self {
        let (parent, name) = match path.rfind_byte(b'/') {
            Some(i) => (&path[..i], &path[i + 1..]),
            None => (&path[..0], path),
        };
        if !name.is_empty() {
            self.dir_node(parent).insert(BString::from(name), node);
        }
        self
    }

    /// Store every blob and tree in `store`, returning the root tree id.
    pub fn build(&self, store: &mut MemoryTree) -> ObjectId {
        build_dir(&self.root, store)
    }
}

fn build_dir(children: &BTreeMap<BString, Node>, store: &mut MemoryTree) -> ObjectId {
    let entries = children
        .iter()
        .map(|(name, node)| {
            let (mode, oid) = match node {
                Node::Leaf { mode, content } => (*mode, store.insert_blob(content.clone())),
                Node::Gitlink(commit) => (FileMode::GITLINK, *commit),
                Node::Dir(grandchildren) => (FileMode::DIRECTORY, build_dir(grandchildren, store)),
            };
            TreeEntry {
                name: name.clone(),
                mode,
                oid,
            }
        })
        .collect();
    store.insert_tree(entries)
}
