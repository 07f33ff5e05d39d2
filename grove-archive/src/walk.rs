// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! The archive walk.
//!
//! Directories are not written when they are visited. They are queued on a
//! stack and only written once a file below them is written, outermost
//! first. Whatever is still queued when the walk ends is dropped, so a
//! directory whose contents are all excluded never shows up in the archive.
//! Files are classified before the queue is flushed for the same reason.

use bstr::{BStr, BString, ByteSlice as _};
use tracing::{debug, info, trace};

use crate::args::ArchiveArgs;
use crate::attr::{AttributeFilter, AttributeSource};
use crate::error::{ArchiveError, ContentError};
use crate::filter::ContentFilter;
use crate::object::{FileMode, ObjectId};
use crate::subst::substitute;
use crate::tree::{ObjectStore, TreeWalker, Visit, VisitEntry};

/// Target of the per-entry verbose report.
pub const VERBOSE_TARGET: &str = "grove_archive::verbose";

/// Mode of the directory entry written for a `/`-terminated prefix.
pub const PREFIX_DIR_MODE: FileMode = FileMode::from_raw(0o40777);

/// Collaborators a walk reads from.
#[derive(Clone, Copy)]
pub struct ArchiveSources<'a> {
    pub trees: &'a dyn TreeWalker,
    pub objects: &'a dyn ObjectStore,
    /// Attributes committed with the tree.
    pub attributes: &'a dyn AttributeSource,
    /// Attributes of a worktree, used when the arguments ask for them.
    pub worktree_attributes: Option<&'a dyn AttributeSource>,
    pub content_filter: &'a dyn ContentFilter,
}

/// One fully resolved entry handed to an archive backend.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveEntry<'a> {
    pub oid: ObjectId,
    /// Prefix and path; directories and gitlinks end in `/`.
    pub path: &'a BStr,
    pub mode: FileMode,
    /// Final content for files and symlinks, `None` for directories.
    pub content: Option<&'a [u8]>,
}

/// Receives entries in archive order.
pub trait EntrySink {
    fn write_entry(&mut self, entry: &ArchiveEntry<'_>) -> Result<(), ArchiveError>;
}

impl<F> EntrySink for F
where
    F: FnMut(&ArchiveEntry<'_>) -> Result<(), ArchiveError>,
{
    fn write_entry(&mut self, entry: &ArchiveEntry<'_>) -> Result<(), ArchiveError> {
        self(entry)
    }
}

#[derive(Debug)]
struct PendingDirectory {
    oid: ObjectId,
    /// Relative to the tree root, with a trailing `/`.
    path: BString,
    mode: FileMode,
    stage: u32,
}

struct Walk<'w, 'a> {
    args: &'w ArchiveArgs<'a>,
    sources: &'w ArchiveSources<'a>,
    filter: AttributeFilter<'a>,
    /// Outermost directory first; each entry's path is a prefix of the next.
    pending: Vec<PendingDirectory>,
    sink: &'w mut dyn EntrySink,
}

impl Walk<'_, '_> {
    fn visit(&mut self, entry: &VisitEntry<'_>) -> Result<Visit, ArchiveError> {
        while let Some(top) = self.pending.last() {
            if entry.base.starts_with(&top.path) {
                break;
            }
            debug!(path = %top.path, "dropping unwritten directory");
            self.pending.pop();
        }

        let path = entry.path();
        trace!(path = %path, mode = %entry.mode, "visit");

        if entry.mode.is_dir() {
            if self.filter.classify(&path, true).ignore {
                debug!(path = %path, "directory is export-ignored");
                return Ok(Visit::Skip);
            }
            let mut dir_path = path;
            dir_path.push(b'/');
            debug!(path = %dir_path, "queueing directory");
            self.pending.push(PendingDirectory {
                oid: entry.oid,
                path: dir_path,
                mode: entry.mode,
                stage: entry.stage,
            });
            return Ok(Visit::Recurse);
        }

        let attrs = self.filter.classify(&path, false);
        if attrs.ignore {
            debug!(path = %path, "export-ignored");
            return Ok(Visit::Skip);
        }
        self.flush_pending()?;
        self.write_entry(entry.oid, &path, entry.mode, attrs.substitute)?;
        Ok(Visit::Skip)
    }

    /// Write every queued directory, outermost first.
    fn flush_pending(&mut self) -> Result<(), ArchiveError> {
        for dir in std::mem::take(&mut self.pending) {
            debug!(path = %dir.path, stage = dir.stage, "writing queued directory");
            let path = &dir.path[..dir.path.len() - 1];
            self.write_entry(dir.oid, path, dir.mode, false)?;
        }
        Ok(())
    }

    /// Write one entry; `convert` requests keyword substitution.
    fn write_entry(
        &mut self,
        oid: ObjectId,
        path: &[u8],
        mode: FileMode,
        convert: bool,
    ) -> Result<(), ArchiveError> {
        let mut full_path = self.args.prefix.clone();
        full_path.extend_from_slice(path);

        if mode.is_dir_like() {
            full_path.push(b'/');
            return self.emit(oid, &full_path, mode, None);
        }

        let blob = self
            .sources
            .objects
            .read_blob(&oid)
            .map_err(|source| ContentError::Read {
                path: path.into(),
                source,
            })?;
        let mut content = blob.to_vec();
        if mode.is_regular() {
            content = self.sources.content_filter.apply(path, content)?;
            if let (true, Some(commit)) = (convert, self.args.commit) {
                content = substitute(commit, content);
            }
        }
        self.emit(oid, &full_path, mode, Some(&content))
    }

    fn emit(
        &mut self,
        oid: ObjectId,
        path: &[u8],
        mode: FileMode,
        content: Option<&[u8]>,
    ) -> Result<(), ArchiveError> {
        if self.args.verbose {
            info!(target: VERBOSE_TARGET, "{}", path.as_bstr());
        }
        self.sink.write_entry(&ArchiveEntry {
            oid,
            path: path.as_bstr(),
            mode,
            content,
        })
    }
}

/// Walk `args.tree` and hand every entry to `sink` in archive order.
///
/// A prefix ending in `/` gets a directory entry of its own first. An error
/// from any collaborator stops the walk; entries already handed to `sink`
/// stay written.
pub fn write_archive_entries(
    args: &ArchiveArgs<'_>,
    sources: &ArchiveSources<'_>,
    sink: &mut dyn EntrySink,
) -> Result<(), ArchiveError> {
    let attributes = match (args.worktree_attributes, sources.worktree_attributes) {
        (true, Some(worktree)) => worktree,
        _ => sources.attributes,
    };
    let mut walk = Walk {
        args,
        sources,
        filter: AttributeFilter::new(attributes),
        pending: Vec::new(),
        sink,
    };

    if args.prefix.ends_with(b"/") {
        let mut len = args.prefix.len();
        while len > 1 && args.prefix[len - 2] == b'/' {
            len -= 1;
        }
        let prefix = &args.prefix[..len];
        walk.emit(args.tree, prefix, PREFIX_DIR_MODE, None)?;
    }

    let result = sources
        .trees
        .walk(&args.tree, &args.pathspec, &mut |entry| walk.visit(entry));
    if !walk.pending.is_empty() {
        debug!(count = walk.pending.len(), "dropping unwritten directories");
        walk.pending.clear();
    }
    result
}


#[cfg(test)]
mod proptests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::attr::ArchiveAttributes;
    use crate::error::AttrError;
    use crate::filter::Passthrough;
    use crate::identity::Identity;
    use crate::pathspec::Pathspec;
    use crate::tree::{MemoryTree, TreeBuilder};
    use grove_utils_test::{TreeFile, arb_file_tree};
    use proptest::prelude::*;

    fn archive(files: &BTreeMap<String, TreeFile>) -> Vec<String> {
        let mut store = MemoryTree::new();
        let mut builder = TreeBuilder::new();
        for (path, file) in files {
            if file.executable {
                builder.executable(path, file.content.clone());
            } else {
                builder.file(path, file.content.clone());
            }
        }
        let root = builder.build(&mut store);

        let attributes = |path: &[u8], is_dir: bool| -> Result<ArchiveAttributes, AttrError> {
            let ignore = !is_dir
                && files
                    .get(&String::from_utf8_lossy(path).into_owned())
                    .is_some_and(|f| f.ignored);
            Ok(ArchiveAttributes {
                ignore,
                substitute: false,
            })
        };
        let sources = ArchiveSources {
            trees: &store,
            objects: &store,
            attributes: &attributes,
            worktree_attributes: None,
            content_filter: &Passthrough,
        };
        let args = ArchiveArgs {
            tree: root,
            commit: None,
            time: 0,
            prefix: BString::default(),
            pathspec: Pathspec::default(),
            compression_level: None,
            verbose: false,
            worktree_attributes: false,
            owner: Identity::default(),
            group: Identity::default(),
            umask: 0o002,
        };
        let mut out = Vec::new();
        write_archive_entries(&args, &sources, &mut |entry: &ArchiveEntry<'_>| {
            out.push(entry.path.to_string());
            Ok(())
        })
        .unwrap();
        out
    }

    proptest! {
        #[test]
        fn directories_appear_only_with_written_descendants(files in arb_file_tree(24)) {
            let out = archive(&files);
            for dir in out.iter().filter(|p| p.ends_with('/')) {
                let has_kept_file = files
                    .iter()
                    .any(|(path, file)| path.starts_with(dir.as_str()) && !file.ignored);
                prop_assert!(has_kept_file, "{dir} written without kept descendants");
            }
            for (path, file) in &files {
                grove_utils_test::pretty_prop_assert_eq!(out.contains(path), !file.ignored, "{}", path);
            }
        }

        #[test]
        fn parents_precede_children_in_tree_order(files in arb_file_tree(24)) {
            let out = archive(&files);
            for (index, path) in out.iter().enumerate() {
                let trimmed = path.trim_end_matches('/');
                if let Some((parent, _)) = trimmed.rsplit_once('/') {
                    let parent = format!("{parent}/");
                    let parent_index = out.iter().position(|p| *p == parent);
                    prop_assert!(parent_index.is_some_and(|i| i < index), "{parent} after {path}");
                }
            }
            let mut seen = std::collections::HashSet::new();
            for path in &out {
                prop_assert!(seen.insert(path.clone()), "{path} written twice");
            }
        }
    }
}
