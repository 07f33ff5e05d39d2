// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use grove_archive::fs::load_dir;
use grove_archive::{
    ArchiveOptions, ArchiveSources, Commit, CommitInfo, ContentFilter, GitAttributes, LineEndings,
    Passthrough, Registry, SystemIdentities, TreeAttributeFiles, WorktreeAttributeFiles,
};
use grove_ustar::{EntryType, verify as verify_stream};
use tracing::{debug, warn};

use crate::cli::{ArchiveCommand, VerifyCommand};
use crate::config::Config;
use crate::error::{CliError, IoContext, Result};

/// Flags win over the configuration file.
pub fn archive_options(command: &ArchiveCommand, config: &Config) -> ArchiveOptions {
    ArchiveOptions {
        format: command.format.clone().or_else(|| config.format.clone()),
        output: command
            .output
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned()),
        prefix: command.prefix.clone().or_else(|| config.prefix.clone()),
        subtree: command.subtree.clone(),
        paths: command.paths.clone(),
        compression_level: command.compression_level.or(config.compression_level),
        verbose: command.verbose,
        worktree_attributes: command.worktree_attributes,
        owner: command.owner.clone().or_else(|| config.owner.clone()),
        group: command.group.clone().or_else(|| config.group.clone()),
        umask: command.umask.or(config.umask),
        remote: command.remote,
    }
}

fn read_commit(path: &Path) -> Result<CommitInfo> {
    let contents = std::fs::read_to_string(path)
        .io_context(|| format!("failed to read commit metadata {}", path.display()))?;
    toml::from_str(&contents).map_err(|source| CliError::Toml {
        path: path.display().to_string(),
        source,
    })
}

/// Run `grove archive`. The archive goes to `--output` if given, else to
/// `stdout`; `--list` prints format names to `stdout`.
pub fn archive(command: &ArchiveCommand, config: &Config, stdout: &mut dyn Write) -> Result<()> {
    let registry = Registry::builtin();
    if command.list {
        for name in registry.names(command.remote) {
            writeln!(stdout, "{name}").io_context(|| "failed to write format list".into())?;
        }
        return Ok(());
    }

    let dir = command
        .dir
        .as_deref()
        .ok_or_else(|| CliError::usage("a directory to archive is required"))?;
    let (store, tree) = load_dir(dir)?;
    let commit = command.commit.as_deref().map(read_commit).transpose()?;

    let options = archive_options(command, config);
    let (archiver, args) = options.resolve(
        registry,
        &store,
        tree,
        commit.as_ref().map(|commit| commit as &dyn Commit),
        &SystemIdentities,
    )?;

    let attributes = GitAttributes::new(TreeAttributeFiles {
        trees: &store,
        objects: &store,
        tree: args.tree,
    });
    let worktree_root = match options.subtree.as_deref() {
        Some(subtree) => dir.join(subtree),
        None => dir.to_owned(),
    };
    let worktree_attributes = GitAttributes::new(WorktreeAttributeFiles::new(worktree_root));
    let eol_filter;
    let content_filter: &dyn ContentFilter = match command.eol.or(config.eol) {
        Some(eol) => {
            eol_filter = LineEndings(eol);
            &eol_filter
        }
        None => &Passthrough,
    };
    let sources = ArchiveSources {
        trees: &store,
        objects: &store,
        attributes: &attributes,
        worktree_attributes: Some(&worktree_attributes),
        content_filter,
    };

    match &command.output {
        Some(path) => {
            let file = File::create(path)
                .io_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            archiver.write_archive(&args, &sources, &mut out)?;
            out.flush()
                .io_context(|| format!("failed to write {}", path.display()))?;
            debug!(path = %path.display(), format = archiver.name(), "archive written");
        }
        None => {
            archiver.write_archive(&args, &sources, stdout)?;
            stdout.flush().io_context(|| "failed to write to stdout".into())?;
        }
    }
    Ok(())
}

fn type_char(entry_type: EntryType) -> char {
    match entry_type {
        EntryType::Regular => '-',
        EntryType::Directory => 'd',
        EntryType::Symlink => 'l',
        EntryType::GlobalHeader => 'g',
        EntryType::ExtendedHeader => 'x',
        EntryType::Other(byte) => byte as char,
    }
}

/// Who an entry belongs to, as recorded in its header and pax records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Owner {
    uid: u32,
    gid: u32,
    uname: String,
    gname: String,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}/{}", self.uid, self.gid, self.uname, self.gname)
    }
}

/// Run `grove verify`: list every entry with its owner, then a summary.
/// Anomalies are reported but do not fail the command; malformed headers
/// do, and so do mixed owners under `--fail-if-multi`.
pub fn verify(command: &VerifyCommand, stdout: &mut dyn Write) -> Result<()> {
    let path = command.file.as_path();
    let file = File::open(path).io_context(|| format!("failed to open {}", path.display()))?;
    let compressed = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| Registry::builtin().format_from_filename(name))
        .is_some_and(|archiver| archiver.flags().compression_levels.is_some());
    let input: Box<dyn Read> = if compressed {
        Box::new(
            zstd::Decoder::new(file)
                .io_context(|| format!("failed to decompress {}", path.display()))?,
        )
    } else {
        Box::new(BufReader::new(file))
    };

    let mut lines = Vec::new();
    let mut owners = BTreeSet::new();
    let summary = verify_stream(input, |entry| {
        let owner = Owner {
            uid: entry.header.uid().unwrap_or_default(),
            gid: entry.header.gid().unwrap_or_default(),
            uname: String::from_utf8_lossy(&entry.uname).into_owned(),
            gname: String::from_utf8_lossy(&entry.gname).into_owned(),
        };
        let mut line = format!(
            "{} {:04o} {} {:>10} {}",
            type_char(entry.entry_type),
            entry.header.mode().unwrap_or_default(),
            owner,
            entry.size,
            String::from_utf8_lossy(&entry.path)
        );
        if !entry.link_target.is_empty() {
            line.push_str(" -> ");
            line.push_str(&String::from_utf8_lossy(&entry.link_target));
        }
        lines.push(line);
        if !entry.entry_type.is_pax() {
            owners.insert(owner);
        }
    })?;

    let uniq = command.uniq || command.fail_if_multi;
    let write = |stdout: &mut dyn Write| -> std::io::Result<()> {
        for line in &lines {
            writeln!(stdout, "{line}")?;
        }
        writeln!(
            stdout,
            "{} entries, {} data bytes, empty block runs {:?}",
            summary.entries, summary.data_bytes, summary.empty_block_runs
        )?;
        for anomaly in &summary.anomalies {
            writeln!(stdout, "anomaly: {anomaly:?}")?;
        }
        if uniq {
            for owner in &owners {
                writeln!(stdout, "owner {owner}")?;
            }
        }
        Ok(())
    };
    write(stdout).io_context(|| "failed to write report".into())?;
    if summary.is_truncated() {
        warn!(path = %path.display(), "archive is truncated");
    }
    if command.fail_if_multi && owners.len() > 1 {
        return Err(CliError::MultipleOwners(owners.len()));
    }
    Ok(())
}
