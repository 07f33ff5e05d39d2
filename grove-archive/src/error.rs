// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Error types for archive generation.

use std::io;
use std::path::PathBuf;

use bstr::BString;
use derive_more::Display;
use grove_ustar::HeaderError;
use thiserror::Error;

use crate::object::ObjectId;

/// Which identity a spec was meant to resolve.
#[derive(Debug, Display, PartialEq, Eq, Clone, Copy)]
pub enum IdentityKind {
    #[display("owner")]
    Owner,
    #[display("group")]
    Group,
}

/// Failure to resolve a `name[:id]` specification.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum IdentityError {
    #[error("'{spec}': invalid {kind} specification")]
    Syntax { kind: IdentityKind, spec: String },

    #[error("'{spec}': numeric {kind} id is too large")]
    IdTooLarge { kind: IdentityKind, spec: String },

    #[error("{kind} id too large: {id} (spec '{spec}', at most {max})", max = crate::identity::MAX_ID)]
    OutOfRange {
        kind: IdentityKind,
        spec: String,
        id: u32,
    },
}

/// Problems with the archive request, detected before any entry is written.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("unknown archive format '{0}'")]
    UnknownFormat(String),

    #[error("archive format '{0}' is not available remotely")]
    NotRemoteCapable(String),

    #[error("archive format '{format}' does not support compression level {level}")]
    UnsupportedCompression { format: String, level: u32 },

    #[error("compression level {level} is out of range for '{format}'")]
    InvalidCompressionLevel { format: String, level: u32 },

    #[error("pathspec '{0}' did not match any files")]
    PathspecNoMatch(String),

    #[error("not a directory: '{0}'")]
    NotADirectory(BString),

    #[error("invalid pathspec '{pattern}': {reason}")]
    InvalidPathspec { pattern: String, reason: String },
}

/// Object lookup failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object {0} not found")]
    Missing(ObjectId),

    #[error("object {0} is not a tree")]
    NotATree(ObjectId),

    #[error("object {0} is not a blob")]
    NotABlob(ObjectId),

    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported file type at '{0}'")]
    UnsupportedFileType(PathBuf),
}

/// The attribute source could not be consulted.
///
/// The attribute filter recovers from these by treating the path as plain.
#[derive(Error, Debug)]
pub enum AttrError {
    #[error("cannot read attributes from the tree: {0}")]
    Store(#[from] StoreError),

    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Content of one entry could not be produced.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: BString,
        #[source]
        source: StoreError,
    },

    #[error("content filter failed for '{path}': {reason}")]
    Filter { path: BString, reason: String },
}

/// Any failure of an archive-generation run.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("cannot encode entry '{path}': {source}")]
    Header {
        path: BString,
        #[source]
        source: HeaderError,
    },

    #[error("archive write failed: {0}")]
    Backend(#[from] io::Error),
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
