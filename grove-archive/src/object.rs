// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use sha1::{Digest as _, Sha1};
use thiserror::Error;

const OID_SIZE: usize = 160 / 8;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("invalid object id '{0}'")]
pub struct InvalidObjectId(String);

/// Content address of a blob or tree: the SHA-1 of its typed encoding.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct ObjectId([u8; OID_SIZE]);

impl ObjectId {
    pub const NULL: ObjectId = ObjectId([0u8; OID_SIZE]);

    pub const fn new(digest: [u8; OID_SIZE]) -> ObjectId {
        ObjectId(digest)
    }

    /// Hash `data` as an object of the given kind (`blob`, `tree`).
    pub fn hash_object(kind: &str, data: &[u8]) -> ObjectId {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
        hasher.update(data.len().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(data);
        ObjectId(hasher.finalize().into())
    }

    pub fn for_blob(data: &[u8]) -> ObjectId {
        Self::hash_object("blob", data)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; OID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Leading hex digits, as used for abbreviated ids.
    pub fn abbrev(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.min(OID_SIZE * 2));
        hex
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digest = [0u8; OID_SIZE];
        hex::decode_to_slice(s, &mut digest).map_err(|_| InvalidObjectId(s.to_owned()))?;
        Ok(ObjectId(digest))
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;
const S_IFGITLINK: u32 = 0o160000;

/// Mode bits of a tree entry.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct FileMode(u32);

impl FileMode {
    pub const DIRECTORY: FileMode = FileMode(S_IFDIR);
    pub const REGULAR: FileMode = FileMode(S_IFREG | 0o644);
    pub const EXECUTABLE: FileMode = FileMode(S_IFREG | 0o755);
    pub const SYMLINK: FileMode = FileMode(S_IFLNK);
    pub const GITLINK: FileMode = FileMode(S_IFGITLINK);

    pub const fn from_raw(raw: u32) -> FileMode {
        FileMode(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_dir(self) -> bool {
        self.0 & S_IFMT == S_IFDIR
    }

    #[inline]
    pub const fn is_regular(self) -> bool {
        self.0 & S_IFMT == S_IFREG
    }

    #[inline]
    pub const fn is_symlink(self) -> bool {
        self.0 & S_IFMT == S_IFLNK
    }

    #[inline]
    pub const fn is_gitlink(self) -> bool {
        self.0 & S_IFMT == S_IFGITLINK
    }

    /// Regular file with the owner execute bit.
    #[inline]
    pub const fn is_executable(self) -> bool {
        self.is_regular() && self.0 & 0o100 != 0
    }

    /// Directories and gitlinks are archived as directory entries.
    #[inline]
    pub const fn is_dir_like(self) -> bool {
        self.is_dir() || self.is_gitlink()
    }

    /// Canonical tree-object spelling (`40000`, `100644`, ...).
    pub(crate) fn tree_bytes(self) -> String {
        format!("{:o}", self.0)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.0)
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMode({self})")
    }
}

#[cfg(test)]
mod unittests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn blob_ids_match_git() {
        // `printf '' | git hash-object --stdin`
        assert_eq!(
            ObjectId::for_blob(b""),
            ObjectId::new(hex!("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"))
        );
        // `printf 'hello\n' | git hash-object --stdin`
        assert_eq!(
            ObjectId::for_blob(b"hello\n").to_string(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn parse_and_abbreviate() {
        let oid: ObjectId = "ce013625030ba8dba906f756967f9e9ca394464a".parse().unwrap();
        assert_eq!(oid.abbrev(7), "ce01362");
        assert!("xyz".parse::<ObjectId>().is_err());
        assert!("ce01".parse::<ObjectId>().is_err());
    }

    #[test]
    fn mode_predicates() {
        assert!(FileMode::DIRECTORY.is_dir());
        assert!(FileMode::from_raw(0o40777).is_dir());
        assert!(FileMode::EXECUTABLE.is_executable());
        assert!(!FileMode::REGULAR.is_executable());
        assert!(FileMode::SYMLINK.is_symlink());
        assert!(FileMode::GITLINK.is_dir_like());
        assert!(!FileMode::GITLINK.is_dir());
        assert_eq!(FileMode::DIRECTORY.tree_bytes(), "40000");
        assert_eq!(FileMode::REGULAR.to_string(), "100644");
    }
}
