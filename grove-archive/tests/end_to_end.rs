// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use grove_archive::{
    ArchiveOptions, ArchiveSources, Commit, CommitInfo, ContentRenderer, GitAttributes,
    LineEnding, LineEndings, MemoryTree, ObjectId, Passthrough, Registry, SystemIdentities,
    TreeAttributeFiles, TreeBuilder, fs::load_dir,
};
use grove_ustar::{EntryType, verify};
use grove_utils_test::fixtures::{Node, write_tree};
use pretty_assertions::assert_eq;

struct ReleaseCommit;

impl ContentRenderer for ReleaseCommit {
    fn render(&self, template: &[u8], out: &mut Vec<u8>) {
        match template {
            b"%H" => out.extend_from_slice(b"abc123"),
            other => out.extend_from_slice(other),
        }
    }
}

impl Commit for ReleaseCommit {
    fn id(&self) -> String {
        "abc123".into()
    }

    fn commit_time(&self) -> i64 {
        1_700_000_000
    }
}

#[derive(Debug, PartialEq)]
struct Listed {
    path: String,
    entry_type: EntryType,
    mode: u32,
    data: Vec<u8>,
}

fn list(bytes: &[u8]) -> Vec<Listed> {
    let mut listed = Vec::new();
    let summary = verify(bytes, |entry| {
        if entry.entry_type == EntryType::GlobalHeader {
            return;
        }
        listed.push(Listed {
            path: String::from_utf8(entry.path.clone()).unwrap(),
            entry_type: entry.entry_type,
            mode: entry.header.mode().unwrap(),
            data: entry.data.clone(),
        });
    })
    .unwrap();
    assert!(summary.anomalies.is_empty(), "{:?}", summary.anomalies);
    listed
}

fn archive(
    options: &ArchiveOptions,
    store: &MemoryTree,
    tree: ObjectId,
    commit: Option<&dyn Commit>,
    filter: &dyn grove_archive::ContentFilter,
) -> Vec<u8> {
    let (archiver, args) = options
        .resolve(Registry::builtin(), store, tree, commit, &SystemIdentities)
        .unwrap();
    let attributes = GitAttributes::new(TreeAttributeFiles {
        trees: store,
        objects: store,
        tree: args.tree,
    });
    let sources = ArchiveSources {
        trees: store,
        objects: store,
        attributes: &attributes,
        worktree_attributes: None,
        content_filter: filter,
    };
    let mut out: Vec<u8> = Vec::new();
    archiver.write_archive(&args, &sources, &mut out).unwrap();
    out
}

fn release_tree(store: &mut MemoryTree) -> ObjectId {
    TreeBuilder::new()
        .file(
            ".gitattributes",
            ".gitattributes export-ignore\nsecret.bin export-ignore\n*.pem export-ignore\ndocs/readme.txt export-subst\n",
        )
        .file("docs/readme.txt", "hi $Format:%H$")
        .file("docs/secret.bin", "do not ship")
        .executable("bin/tool", "#!/bin/sh\n")
        .file("keys/signing.pem", "private")
        .build(store)
}

#[test_log::test]
fn release_tarball() {
    let mut store = MemoryTree::new();
    let tree = release_tree(&mut store);
    let options = ArchiveOptions {
        prefix: Some("proj-1.0/".into()),
        ..Default::default()
    };
    let commit = ReleaseCommit;
    let bytes = archive(&options, &store, tree, Some(&commit), &Passthrough);

    let entry = |path: &str, entry_type, mode, data: &[u8]| Listed {
        path: path.into(),
        entry_type,
        mode,
        data: data.to_vec(),
    };
    let listed = list(&bytes);
    assert_eq!(
        listed,
        vec![
            entry("proj-1.0/", EntryType::Directory, 0o775, b""),
            entry("proj-1.0/bin/", EntryType::Directory, 0o775, b""),
            entry("proj-1.0/bin/tool", EntryType::Regular, 0o775, b"#!/bin/sh\n"),
            entry("proj-1.0/docs/", EntryType::Directory, 0o775, b""),
            entry("proj-1.0/docs/readme.txt", EntryType::Regular, 0o664, b"hi abc123"),
        ]
    );
    // an ignored sibling neither repeats nor hides its directory, and a
    // directory holding only ignored files is left out
    assert_eq!(listed.iter().filter(|e| e.path == "proj-1.0/docs/").count(), 1);
    assert!(!listed.iter().any(|e| e.path.contains("secret.bin")));
    assert!(!listed.iter().any(|e| e.path.starts_with("proj-1.0/keys")));

    let comment = verify(bytes.as_slice(), |entry| {
        if entry.entry_type == EntryType::GlobalHeader {
            let record = entry.pax_records().next().unwrap().unwrap();
            assert_eq!(record.key, b"comment");
            assert_eq!(record.value, b"abc123");
        }
    })
    .unwrap();
    assert_eq!(comment.entries, 6);
}

#[test_log::test]
fn same_request_gives_identical_bytes() {
    let mut store = MemoryTree::new();
    let tree = release_tree(&mut store);
    let options = ArchiveOptions {
        format: Some("tar.zst".into()),
        prefix: Some("proj/".into()),
        compression_level: Some(5),
        ..Default::default()
    };
    let commit = ReleaseCommit;
    let first = archive(&options, &store, tree, Some(&commit), &Passthrough);
    let second = archive(&options, &store, tree, Some(&commit), &Passthrough);
    assert_eq!(first, second);
}

#[test_log::test]
fn pathspec_and_line_endings() {
    let mut store = MemoryTree::new();
    let tree = TreeBuilder::new()
        .file("notes/a.txt", "one\ntwo\n")
        .file("notes/b.md", "skip\n")
        .file("src/lib.rs", "fn f() {}\n")
        .build(&mut store);
    let options = ArchiveOptions {
        paths: vec!["notes/*.txt".into()],
        umask: Some(0o022),
        ..Default::default()
    };
    let filter = LineEndings(LineEnding::Crlf);
    let bytes = archive(&options, &store, tree, None, &filter);

    let paths: Vec<_> = list(&bytes)
        .into_iter()
        .map(|e| (e.path, e.mode, e.data))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("notes/".to_owned(), 0o755, vec![]),
            ("notes/a.txt".to_owned(), 0o644, b"one\r\ntwo\r\n".to_vec()),
        ]
    );
}

#[test_log::test]
fn commit_metadata_from_toml() {
    let commit: CommitInfo = toml::from_str(
        r#"
        id = "ce013625030ba8dba906f756967f9e9ca394464a"
        tree = "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        message = "Release 1.0\n"

        [author]
        name = "A U Thor"
        email = "author@example.com"
        time = 1112911993

        [committer]
        name = "C O Mitter"
        email = "committer@example.com"
        time = 1112912053
        "#,
    )
    .unwrap();

    let mut store = MemoryTree::new();
    let tree = TreeBuilder::new()
        .file(".gitattributes", "VERSION export-subst\n")
        .file("VERSION", "$Format:%h %s$\n")
        .build(&mut store);
    let bytes = archive(&ArchiveOptions::default(), &store, tree, Some(&commit), &Passthrough);

    let version = list(&bytes)
        .into_iter()
        .find(|e| e.path == "VERSION")
        .unwrap();
    assert_eq!(version.data, b"ce01362 Release 1.0\n");
    let summary = verify(bytes.as_slice(), |_| {}).unwrap();
    assert_eq!(summary.entries, 3);
}

#[test_log::test]
fn archive_a_directory_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("Cargo.toml", Node::File(b"[package]\n")),
            ("target/.gitattributes", Node::File(b"* export-ignore\n")),
            ("target/debug/out", Node::File(b"binary")),
            ("run", Node::Executable(b"#!/bin/sh\n")),
        ],
    )
    .unwrap();
    let (store, tree) = load_dir(dir.path()).unwrap();
    let bytes = archive(&ArchiveOptions::default(), &store, tree, None, &Passthrough);

    let paths: Vec<_> = list(&bytes).into_iter().map(|e| e.path).collect();
    assert_eq!(paths, vec!["Cargo.toml", "run"]);
}
