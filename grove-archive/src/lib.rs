// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Export a snapshot of a content-addressed tree as an archive.
//!
//! An archive run resolves an [`ArchiveOptions`] request into
//! [`ArchiveArgs`], walks the tree in canonical order and hands every
//! surviving entry to a format backend from the [`Registry`].
//!
//! # Pipeline
//!
//! 1. **Resolve**: pick the format, parse owner and group, narrow to a
//!    subtree and check that every pathspec item matches.
//! 2. **Walk**: consult `export-ignore` and `export-subst` attributes per
//!    path, defer directories until something below them is written.
//! 3. **Convert**: run file content through the [`ContentFilter`] and expand
//!    `$Format:...$` markers against the bound commit.
//! 4. **Write**: the tar backend emits POSIX ustar with pax extensions,
//!    optionally through zstd.

mod error;
mod wildmatch;

pub mod args;
pub mod attr;
pub mod backend;
pub mod filter;
pub mod fs;
pub mod identity;
pub mod object;
pub mod pathspec;
pub mod pretty;
pub mod registry;
pub mod subst;
pub mod tree;
pub mod walk;

pub use args::{ArchiveArgs, ArchiveOptions, DEFAULT_UMASK};
pub use attr::{
    ArchiveAttributes, AttributeFiles, AttributeFilter, AttributeSource, GitAttributes, NoAttributes,
    TreeAttributeFiles, WorktreeAttributeFiles,
};
pub use backend::tar::TarArchiver;
pub use error::{
    ArchiveError, AttrError, ConfigError, ContentError, IdentityError, IdentityKind, Result,
    StoreError,
};
pub use filter::{ContentFilter, LineEnding, LineEndings, Passthrough};
pub use identity::{Identity, IdentityDb, SystemIdentities, resolve_group, resolve_owner};
pub use object::{FileMode, InvalidObjectId, ObjectId};
pub use pathspec::{PathMatch, Pathspec, check_pathspec};
pub use pretty::{Commit, CommitInfo, ContentRenderer, Signature};
pub use registry::{Archiver, ArchiverFlags, Registry};
pub use subst::substitute;
pub use tree::{MemoryTree, ObjectStore, TreeBuilder, TreeWalker, Visit, VisitEntry};
pub use walk::{ArchiveEntry, ArchiveSources, EntrySink, write_archive_entries};
