// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use grove_archive::LineEnding;

#[derive(Parser, Debug)]
#[command(name = "grove", author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a directory snapshot as an archive.
    Archive(ArchiveCommand),

    /// Read a tar stream and report its entries and structure.
    Verify(VerifyCommand),
}

impl Command {
    pub fn verbose(&self) -> bool {
        matches!(self, Command::Archive(archive) if archive.verbose)
    }
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct ArchiveCommand {
    /// Archive format. Defaults to the extension of --output, else tar.
    #[arg(long)]
    pub format: Option<String>,

    /// Prepended to every path; end it with `/` for a top-level directory.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Write the archive here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// `name`, `id` or `name:id` of the owner of all entries.
    #[arg(long)]
    pub owner: Option<String>,

    /// `name`, `id` or `name:id` of the group of all entries.
    #[arg(long)]
    pub group: Option<String>,

    /// Compression level for compressing formats.
    #[arg(long)]
    pub compression_level: Option<u32>,

    /// Archive only this directory of the snapshot.
    #[arg(long)]
    pub subtree: Option<String>,

    /// Permission bits cleared from every entry, in octal.
    #[arg(long, value_parser = parse_umask)]
    pub umask: Option<u32>,

    /// Convert line endings of text files.
    #[arg(long)]
    pub eol: Option<LineEnding>,

    /// Read `.gitattributes` from the directory on disk rather than the
    /// snapshot.
    #[arg(long)]
    pub worktree_attributes: bool,

    /// TOML commit metadata used for `$Format:...$` substitution.
    #[arg(long)]
    pub commit: Option<PathBuf>,

    /// Accept only formats that may be served remotely.
    #[arg(long)]
    pub remote: bool,

    /// Report each archived path on stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the available formats and exit.
    #[arg(long)]
    pub list: bool,

    /// Directory to archive.
    #[arg(required_unless_present = "list")]
    pub dir: Option<PathBuf>,

    /// Restrict the archive to these paths or patterns.
    pub paths: Vec<String>,
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct VerifyCommand {
    /// The archive to check; `.tar.zst` and `.tzst` are decompressed.
    pub file: PathBuf,

    /// After the summary, print each distinct owner and group once.
    #[arg(long)]
    pub uniq: bool,

    /// Fail if the entries do not all share one owner and group. Implies
    /// --uniq.
    #[arg(long)]
    pub fail_if_multi: bool,
}

fn parse_umask(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    match u32::from_str_radix(digits, 8) {
        Ok(mask) if mask <= 0o777 => Ok(mask),
        _ => Err(format!("invalid umask '{value}', expected octal 000-777")),
    }
}

#[cfg(test)]
mod unittests {
    use super::*;

    #[test]
    fn parses_archive_flags() {
        let args = Args::try_parse_from([
            "grove",
            "archive",
            "--prefix",
            "proj-1.0/",
            "-o",
            "out.tar.zst",
            "--umask",
            "022",
            "--eol",
            "lf",
            "-v",
            "src",
            "docs",
            "*.md",
        ])
        .unwrap();
        assert!(args.command.verbose());
        let Command::Archive(archive) = args.command else {
            panic!("expected archive");
        };
        assert_eq!(archive.prefix.as_deref(), Some("proj-1.0/"));
        assert_eq!(archive.umask, Some(0o022));
        assert_eq!(archive.eol, Some(LineEnding::Lf));
        assert_eq!(archive.dir, Some(PathBuf::from("src")));
        assert_eq!(archive.paths, vec!["docs", "*.md"]);
    }

    #[test]
    fn list_needs_no_directory() {
        let args = Args::try_parse_from(["grove", "archive", "--list"]).unwrap();
        assert!(matches!(args.command, Command::Archive(ArchiveCommand { list: true, dir: None, .. })));
        assert!(Args::try_parse_from(["grove", "archive"]).is_err());
    }

    #[test]
    fn parses_verify_flags() {
        let args = Args::try_parse_from(["grove", "verify", "--fail-if-multi", "out.tar"]).unwrap();
        let Command::Verify(verify) = args.command else {
            panic!("expected verify");
        };
        assert_eq!(verify.file, PathBuf::from("out.tar"));
        assert!(verify.fail_if_multi);
        assert!(!verify.uniq);
    }

    #[test]
    fn rejects_bad_umask_and_eol() {
        assert!(Args::try_parse_from(["grove", "archive", "--umask", "999", "."]).is_err());
        assert!(Args::try_parse_from(["grove", "archive", "--umask", "1777", "."]).is_err());
        assert!(Args::try_parse_from(["grove", "archive", "--eol", "cr", "."]).is_err());
    }
}
