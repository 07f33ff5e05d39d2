// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Archive request resolution.

use std::path::Path;

use bstr::BString;
use chrono::Utc;
use tracing::debug;

use crate::error::{ArchiveError, ConfigError};
use crate::identity::{Identity, IdentityDb, resolve_group, resolve_owner};
use crate::object::ObjectId;
use crate::pathspec::{Pathspec, check_pathspec};
use crate::pretty::Commit;
use crate::registry::{Archiver, Registry};
use crate::tree::TreeWalker;

/// Default permission mask applied by the tar backends.
pub const DEFAULT_UMASK: u32 = 0o002;

/// Everything an archive backend needs to know about one run.
pub struct ArchiveArgs<'a> {
    /// Root of the archived tree.
    pub tree: ObjectId,
    /// Source of keyword-substitution metadata, if any.
    pub commit: Option<&'a dyn Commit>,
    /// Modification time stamped on every entry.
    pub time: i64,
    /// Prepended to every path.
    pub prefix: BString,
    pub pathspec: Pathspec,
    pub compression_level: Option<u32>,
    pub verbose: bool,
    /// Read attributes from the worktree instead of the tree.
    pub worktree_attributes: bool,
    pub owner: Identity,
    pub group: Identity,
    pub umask: u32,
}

/// An archive request as a user states it.
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Format name; derived from `output` when absent, else `tar`.
    pub format: Option<String>,
    pub output: Option<String>,
    pub prefix: Option<String>,
    /// Directory inside the tree to use as the archive root.
    pub subtree: Option<String>,
    pub paths: Vec<String>,
    pub compression_level: Option<u32>,
    pub verbose: bool,
    pub worktree_attributes: bool,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub umask: Option<u32>,
    /// The request arrived over the network; only remote-capable formats
    /// may be used.
    pub remote: bool,
}

impl ArchiveOptions {
    /// Pick the backend and resolve the request into [`ArchiveArgs`].
    ///
    /// Everything that can be rejected is rejected here, before the first
    /// entry is written.
    pub fn resolve<'r, 'a>(
        &self,
        registry: &'r Registry,
        trees: &dyn TreeWalker,
        tree: ObjectId,
        commit: Option<&'a dyn Commit>,
        identities: &dyn IdentityDb,
    ) -> Result<(&'r dyn Archiver, ArchiveArgs<'a>), ArchiveError> {
        let archiver = self.archiver(registry)?;

        let owner = resolve_owner(self.owner.as_deref(), identities).map_err(ConfigError::from)?;
        let group = resolve_group(self.group.as_deref(), identities).map_err(ConfigError::from)?;

        let tree = match self.subtree.as_deref() {
            Some(path) if !path.is_empty() => trees.subtree(&tree, path.as_bytes())?,
            _ => tree,
        };
        let pathspec = Pathspec::new(&self.paths)?;
        check_pathspec(trees, &tree, &pathspec)?;

        let time = commit
            .map(|commit| commit.commit_time())
            .unwrap_or_else(|| Utc::now().timestamp());

        debug!(
            format = archiver.name(),
            tree = %tree,
            time,
            owner = owner.id,
            group = group.id,
            "resolved archive request"
        );
        Ok((
            archiver,
            ArchiveArgs {
                tree,
                commit,
                time,
                prefix: BString::from(self.prefix.as_deref().unwrap_or_default()),
                pathspec,
                compression_level: self.compression_level,
                verbose: self.verbose,
                worktree_attributes: self.worktree_attributes,
                owner,
                group,
                umask: self.umask.unwrap_or(DEFAULT_UMASK),
            },
        ))
    }

    fn archiver<'r>(&self, registry: &'r Registry) -> Result<&'r dyn Archiver, ConfigError> {
        let archiver = match (&self.format, &self.output) {
            (Some(name), _) => registry
                .get(name)
                .ok_or_else(|| ConfigError::UnknownFormat(name.clone()))?,
            (None, Some(output)) => {
                let filename = Path::new(output)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(output.as_str());
                registry
                    .format_from_filename(filename)
                    .or_else(|| registry.get("tar"))
                    .ok_or_else(|| ConfigError::UnknownFormat("tar".into()))?
            }
            (None, None) => registry
                .get("tar")
                .ok_or_else(|| ConfigError::UnknownFormat("tar".into()))?,
        };

        let flags = archiver.flags();
        if self.remote && !flags.remote {
            return Err(ConfigError::NotRemoteCapable(archiver.name().to_owned()));
        }
        if let Some(level) = self.compression_level {
            match flags.compression_levels {
                None => {
                    return Err(ConfigError::UnsupportedCompression {
                        format: archiver.name().to_owned(),
                        level,
                    });
                }
                Some(range) if !range.contains(&level) => {
                    return Err(ConfigError::InvalidCompressionLevel {
                        format: archiver.name().to_owned(),
                        level,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(archiver)
    }
}
