// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! POSIX tar output, plain or zstd-compressed.
//!
//! Every entry is owned by the resolved owner and group and stamped with the
//! archive time. When a commit is bound, a pax global header carrying its id
//! as `comment` comes first.

use std::io::Write;

use bstr::ByteSlice as _;
use grove_ustar::{EntryType, Field, HeaderError, TarWriter, UstarHeader, pax};
use tracing::trace;

use crate::args::ArchiveArgs;
use crate::error::ArchiveError;
use crate::registry::{Archiver, ArchiverFlags};
use crate::walk::{ArchiveEntry, ArchiveSources, write_archive_entries};

/// Largest size the 12-byte size field holds.
const MAX_USTAR_SIZE: u64 = 0o77777777777;

/// zstd level used when the request does not name one.
const DEFAULT_ZSTD_LEVEL: u32 = 3;
const MAX_ZSTD_LEVEL: u32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Zstd,
}

/// The `tar` format and its compressed variants.
#[derive(Debug, Clone)]
pub struct TarArchiver {
    name: &'static str,
    compression: Compression,
}

impl TarArchiver {
    pub fn plain() -> Self {
        Self {
            name: "tar",
            compression: Compression::None,
        }
    }

    pub fn zstd(name: &'static str) -> Self {
        Self {
            name,
            compression: Compression::Zstd,
        }
    }

    fn write_tar(
        &self,
        args: &ArchiveArgs<'_>,
        sources: &ArchiveSources<'_>,
        out: &mut dyn Write,
    ) -> Result<(), ArchiveError> {
        let mut writer = TarWriter::new(out);

        if let Some(commit) = args.commit {
            let mut records = Vec::new();
            pax::push_record(&mut records, pax::COMMENT, commit.id().as_bytes());
            let name = b"pax_global_header";
            let template = header(args, name, EntryType::GlobalHeader, 0o666, 0)
                .map_err(|source| header_error(name, source))?;
            writer.append_pax(EntryType::GlobalHeader, name, &template, &records)?;
        }

        write_archive_entries(args, sources, &mut |entry: &ArchiveEntry<'_>| {
            write_entry(&mut writer, args, entry)
        })?;
        writer.finish()?;
        Ok(())
    }
}

impl Archiver for TarArchiver {
    fn name(&self) -> &str {
        self.name
    }

    fn flags(&self) -> ArchiverFlags {
        ArchiverFlags {
            remote: true,
            compression_levels: match self.compression {
                Compression::None => None,
                Compression::Zstd => Some(0..=MAX_ZSTD_LEVEL),
            },
        }
    }

    fn write_archive(
        &self,
        args: &ArchiveArgs<'_>,
        sources: &ArchiveSources<'_>,
        out: &mut dyn Write,
    ) -> Result<(), ArchiveError> {
        match self.compression {
            Compression::None => self.write_tar(args, sources, out),
            Compression::Zstd => {
                let level = args.compression_level.unwrap_or(DEFAULT_ZSTD_LEVEL);
                let mut encoder = zstd::Encoder::new(out, level.min(MAX_ZSTD_LEVEL) as i32)?;
                self.write_tar(args, sources, &mut encoder)?;
                encoder.finish()?;
                Ok(())
            }
        }
    }
}

fn header_error(path: &[u8], source: HeaderError) -> ArchiveError {
    ArchiveError::Header {
        path: path.into(),
        source,
    }
}

/// A header with the fields shared by every entry of the archive.
fn header(
    args: &ArchiveArgs<'_>,
    path: &[u8],
    entry_type: EntryType,
    mode: u32,
    size: u64,
) -> Result<UstarHeader, HeaderError> {
    let mut header = UstarHeader::new();
    header.set_path(path)?;
    header.set_entry_type(entry_type);
    header.set_mode(mode & 0o7777)?;
    header.set_size(size)?;
    header.set_mtime(u64::try_from(args.time).unwrap_or(0))?;
    header.set_uid(args.owner.id)?;
    header.set_gid(args.group.id)?;
    header.set_bytes(Field::Uname, truncate(args.owner.name.as_bytes(), Field::Uname))?;
    header.set_bytes(Field::Gname, truncate(args.group.name.as_bytes(), Field::Gname))?;
    header.set_octal(Field::Devmajor, 0)?;
    header.set_octal(Field::Devminor, 0)?;
    Ok(header)
}

/// Names longer than their field are cut here; entries carry the full name
/// in a pax record.
fn truncate(value: &[u8], field: Field) -> &[u8] {
    &value[..value.len().min(field.len())]
}

fn write_entry<W: Write>(
    writer: &mut TarWriter<W>,
    args: &ArchiveArgs<'_>,
    entry: &ArchiveEntry<'_>,
) -> Result<(), ArchiveError> {
    let path: &[u8] = entry.path;
    let mode = entry.mode;
    let content = entry.content.unwrap_or_default();

    let (entry_type, perm, data, link): (_, _, &[u8], &[u8]) = if mode.is_dir_like() {
        (EntryType::Directory, (mode.raw() | 0o777) & !args.umask, b"", b"")
    } else if mode.is_symlink() {
        (EntryType::Symlink, mode.raw() | 0o777, b"", content)
    } else {
        let base = if mode.raw() & 0o100 != 0 { 0o777 } else { 0o666 };
        (EntryType::Regular, (mode.raw() | base) & !args.umask, content, b"")
    };
    let size = data.len() as u64;
    trace!(path = %path.as_bstr(), ?entry_type, size, "tar entry");

    let mut records = Vec::new();
    let name_in_header: Vec<u8>;
    let mut header_path = path;
    if path.len() > Field::Name.len() && !fits_split(path) {
        pax::push_record(&mut records, pax::PATH, path);
        name_in_header = format!("{}.data", entry.oid).into_bytes();
        header_path = &name_in_header;
    }
    let link_name: Vec<u8>;
    let mut header_link = link;
    if link.len() > Field::Linkname.len() {
        pax::push_record(&mut records, pax::LINKPATH, link);
        link_name = format!("see {}.paxheader", entry.oid).into_bytes();
        header_link = &link_name;
    }
    for (key, name, field) in [
        (pax::UNAME, args.owner.name.as_bytes(), Field::Uname),
        (pax::GNAME, args.group.name.as_bytes(), Field::Gname),
    ] {
        if name.len() > field.len() {
            pax::push_record(&mut records, key, name);
        }
    }
    let mut header_size = size;
    if size > MAX_USTAR_SIZE {
        pax::push_record(&mut records, pax::SIZE, size.to_string().as_bytes());
        header_size = 0;
    }

    let mut header = header(args, header_path, entry_type, perm, header_size)
        .and_then(|mut header| {
            header.set_bytes(Field::Linkname, header_link)?;
            Ok(header)
        })
        .map_err(|source| header_error(path, source))?;

    if !records.is_empty() {
        let pax_name = format!("{}.paxheader", entry.oid).into_bytes();
        writer.append_pax(EntryType::ExtendedHeader, &pax_name, &header, &records)?;
    }
    header.finalize().map_err(|source| header_error(path, source))?;
    writer.append(&header, data)?;
    Ok(())
}

/// Whether `path` can be split across the prefix and name fields.
fn fits_split(path: &[u8]) -> bool {
    UstarHeader::new().set_path(path).is_ok()
}

#[cfg(test)]
mod unittests {
    use std::io::Read as _;

    use super::*;
    use crate::attr::NoAttributes;
    use crate::filter::Passthrough;
    use crate::identity::Identity;
    use crate::object::ObjectId;
    use crate::pathspec::Pathspec;
    use crate::pretty::{Commit, ContentRenderer};
    use crate::tree::{MemoryTree, TreeBuilder};
    use grove_ustar::{TarReader, verify};

    struct FixedCommit;

    impl ContentRenderer for FixedCommit {
        fn render(&self, _template: &[u8], _out: &mut Vec<u8>) {}
    }

    impl Commit for FixedCommit {
        fn id(&self) -> String {
            "ce013625030ba8dba906f756967f9e9ca394464a".into()
        }

        fn commit_time(&self) -> i64 {
            1_112_912_053
        }
    }

    fn args<'a>(tree: ObjectId) -> ArchiveArgs<'a> {
        ArchiveArgs {
            tree,
            commit: None,
            time: 1_700_000_000,
            prefix: "p/".into(),
            pathspec: Pathspec::default(),
            compression_level: None,
            verbose: false,
            worktree_attributes: false,
            owner: Identity {
                name: "alice".into(),
                id: 1000,
            },
            group: Identity {
                name: "users".into(),
                id: 100,
            },
            umask: 0o022,
        }
    }

    fn archive(archiver: &TarArchiver, args: &ArchiveArgs<'_>, store: &MemoryTree) -> Vec<u8> {
        let sources = ArchiveSources {
            trees: store,
            objects: store,
            attributes: &NoAttributes,
            worktree_attributes: None,
            content_filter: &Passthrough,
        };
        let mut out: Vec<u8> = Vec::new();
        archiver.write_archive(args, &sources, &mut out).unwrap();
        out
    }

    #[test]
    fn entries_carry_modes_owners_and_links() {
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new()
            .file("doc.txt", "text")
            .executable("run.sh", "#!/bin/sh\n")
            .symlink("latest", "doc.txt")
            .build(&mut store);
        let bytes = archive(&TarArchiver::plain(), &args(root), &store);
        assert_eq!(bytes.len() % grove_ustar::RECORD_SIZE, 0);

        let mut seen = Vec::new();
        let summary = verify(bytes.as_slice(), |entry| {
            let header = &entry.header;
            seen.push((
                String::from_utf8(entry.path.clone()).unwrap(),
                entry.entry_type,
                header.mode().unwrap(),
                entry.link_target.clone(),
                entry.data.clone(),
            ));
            assert_eq!(header.uid().unwrap(), 1000);
            assert_eq!(header.gid().unwrap(), 100);
            assert_eq!(header.mtime().unwrap(), 1_700_000_000);
            assert_eq!(header.str_field(Field::Uname), b"alice");
            assert_eq!(header.str_field(Field::Gname), b"users");
        })
        .unwrap();
        assert!(!summary.is_truncated());
        assert_eq!(
            seen,
            vec![
                ("p/".into(), EntryType::Directory, 0o755, vec![], vec![]),
                ("p/doc.txt".into(), EntryType::Regular, 0o644, vec![], b"text".to_vec()),
                ("p/latest".into(), EntryType::Symlink, 0o777, b"doc.txt".to_vec(), vec![]),
                ("p/run.sh".into(), EntryType::Regular, 0o755, vec![], b"#!/bin/sh\n".to_vec()),
            ]
        );
    }

    #[test]
    fn commit_id_goes_into_the_global_header() {
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new().file("a", "a").build(&mut store);
        let commit = FixedCommit;
        let mut args = args(root);
        args.commit = Some(&commit);
        let bytes = archive(&TarArchiver::plain(), &args, &store);

        let first = TarReader::new(bytes.as_slice()).next().unwrap().unwrap();
        assert_eq!(first.entry_type, EntryType::GlobalHeader);
        let record = first.pax_records().next().unwrap().unwrap();
        assert_eq!(record.key, b"comment");
        assert_eq!(record.value, commit.id().as_bytes());
    }

    #[test]
    fn long_paths_and_link_targets_use_pax_records() {
        let unsplittable = "x".repeat(180);
        let long_target = format!("{}/target", "t".repeat(120));
        let splittable = format!("{}/{}", "d".repeat(60), "f".repeat(60));
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new()
            .file(&unsplittable, "1")
            .file(&splittable, "2")
            .symlink("link", &long_target)
            .build(&mut store);
        let mut args = args(root);
        args.prefix = "".into();
        let bytes = archive(&TarArchiver::plain(), &args, &store);

        let entries: Vec<_> = TarReader::new(bytes.as_slice())
            .map(Result::unwrap)
            .collect();
        let paths: Vec<_> = entries
            .iter()
            .map(|e| String::from_utf8(e.path.clone()).unwrap())
            .collect();
        assert!(paths.contains(&unsplittable));
        assert!(paths.contains(&splittable));
        let link = entries.iter().find(|e| e.path == b"link").unwrap();
        assert_eq!(link.link_target, long_target.as_bytes());

        // the splittable path needs no extended header
        let split = entries
            .iter()
            .find(|e| e.path == splittable.as_bytes())
            .unwrap();
        assert_eq!(split.header.path(), splittable.as_bytes());
    }

    #[test]
    fn long_owner_and_group_names_use_pax_records() {
        let owner = "o".repeat(40);
        let group = "g".repeat(33);
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new().file("a", "a").build(&mut store);
        let mut args = args(root);
        args.owner.name = owner.clone();
        args.group.name = group.clone();
        let bytes = archive(&TarArchiver::plain(), &args, &store);

        let mut names = Vec::new();
        verify(bytes.as_slice(), |entry| {
            assert_eq!(entry.header.str_field(Field::Uname), &owner.as_bytes()[..32]);
            names.push((entry.uname.clone(), entry.gname.clone()));
        })
        .unwrap();
        assert_eq!(
            names,
            vec![(owner.clone().into_bytes(), group.clone().into_bytes()); 2]
        );
    }

    #[test]
    fn zstd_output_decompresses_to_the_same_tar() {
        let mut store = MemoryTree::new();
        let root = TreeBuilder::new()
            .file("a/b", "bbb")
            .file("c", "c".repeat(4096))
            .build(&mut store);
        let mut args = args(root);
        let plain = archive(&TarArchiver::plain(), &args, &store);
        args.compression_level = Some(19);
        let compressed = archive(&TarArchiver::zstd("tar.zst"), &args, &store);
        assert!(compressed.len() < plain.len());

        let mut decoded = Vec::new();
        zstd::Decoder::new(compressed.as_slice())
            .unwrap()
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, plain);
    }
}
