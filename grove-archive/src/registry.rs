// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Archive formats by name.

use std::io::Write;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use crate::args::ArchiveArgs;
use crate::backend::tar::TarArchiver;
use crate::error::ArchiveError;
use crate::walk::ArchiveSources;

/// What a format supports beyond plain output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiverFlags {
    /// May be requested over the network.
    pub remote: bool,
    /// Accepted compression levels, if the format compresses.
    pub compression_levels: Option<RangeInclusive<u32>>,
}

/// An archive format backend.
pub trait Archiver: Send + Sync {
    fn name(&self) -> &str;

    fn flags(&self) -> ArchiverFlags;

    /// Walk the tree described by `args` and write the archive to `out`.
    fn write_archive(
        &self,
        args: &ArchiveArgs<'_>,
        sources: &ArchiveSources<'_>,
        out: &mut dyn Write,
    ) -> Result<(), ArchiveError>;
}

/// Formats in registration order. Immutable once built.
#[derive(Default)]
pub struct Registry {
    archivers: Vec<Box<dyn Archiver>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend. A later registration does not replace an earlier one
    /// of the same name.
    pub fn register(&mut self, archiver: Box<dyn Archiver>) {
        self.archivers.push(archiver);
    }

    /// The process-wide registry of built-in formats.
    pub fn builtin() -> &'static Registry {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let mut registry = Registry::new();
            registry.register(Box::new(TarArchiver::plain()));
            registry.register(Box::new(TarArchiver::zstd("tar.zst")));
            registry.register(Box::new(TarArchiver::zstd("tzst")));
            registry
        })
    }

    pub fn get(&self, name: &str) -> Option<&dyn Archiver> {
        self.archivers
            .iter()
            .find(|archiver| archiver.name() == name)
            .map(|archiver| archiver.as_ref())
    }

    /// Registered names, optionally only those usable remotely.
    pub fn names(&self, remote_only: bool) -> impl Iterator<Item = &str> + '_ {
        self.archivers
            .iter()
            .filter(move |archiver| !remote_only || archiver.flags().remote)
            .map(|archiver| archiver.name())
    }

    /// The format whose name is the extension of `filename`, as in
    /// `release.tar.zst`. The extension must follow a `.` and a non-empty
    /// stem.
    pub fn format_from_filename(&self, filename: &str) -> Option<&dyn Archiver> {
        self.archivers
            .iter()
            .find(|archiver| {
                filename
                    .strip_suffix(archiver.name())
                    .and_then(|rest| rest.strip_suffix('.'))
                    .is_some_and(|stem| !stem.is_empty())
            })
            .map(|archiver| archiver.as_ref())
    }
}
