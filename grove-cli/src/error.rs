// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use grove_archive::{ArchiveError, StoreError};
use grove_ustar::FormatError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("cannot snapshot directory: {0}")]
    Store(#[from] StoreError),

    #[error("invalid archive: {0}")]
    Format(#[from] FormatError),

    #[error("not unique: {0} owner and group combinations found")]
    MultipleOwners(usize),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Helper trait for adding context to IO errors
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| CliError::io(f(), e))
    }
}
