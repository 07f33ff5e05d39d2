// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::fmt;
use std::ops::Range;

use bstr::ByteSlice as _;
use derive_more::Display;

use crate::error::{FieldError, HeaderError, OctalError};

/// Size of one header or data block.
pub const BLOCK_SIZE: usize = 512;

/// Archives are padded to a multiple of this many bytes (blocking factor 20).
pub const RECORD_SIZE: usize = BLOCK_SIZE * 20;

const USTAR_MAGIC: &[u8; 6] = b"ustar\0";
const USTAR_VERSION: &[u8; 2] = b"00";

/// Fields of the ustar header, in on-disk order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Display)]
pub enum Field {
    #[display("name")]
    Name,
    #[display("mode")]
    Mode,
    #[display("uid")]
    Uid,
    #[display("gid")]
    Gid,
    #[display("size")]
    Size,
    #[display("mtime")]
    Mtime,
    #[display("checksum")]
    Checksum,
    #[display("typeflag")]
    Typeflag,
    #[display("linkname")]
    Linkname,
    #[display("magic")]
    Magic,
    #[display("version")]
    Version,
    #[display("uname")]
    Uname,
    #[display("gname")]
    Gname,
    #[display("devmajor")]
    Devmajor,
    #[display("devminor")]
    Devminor,
    #[display("prefix")]
    Prefix,
}

impl Field {
    /// Byte range of the field inside the 512-byte block.
    pub const fn range(self) -> Range<usize> {
        match self {
            Field::Name => 0..100,
            Field::Mode => 100..108,
            Field::Uid => 108..116,
            Field::Gid => 116..124,
            Field::Size => 124..136,
            Field::Mtime => 136..148,
            Field::Checksum => 148..156,
            Field::Typeflag => 156..157,
            Field::Linkname => 157..257,
            Field::Magic => 257..263,
            Field::Version => 263..265,
            Field::Uname => 265..297,
            Field::Gname => 297..329,
            Field::Devmajor => 329..337,
            Field::Devminor => 337..345,
            Field::Prefix => 345..500,
        }
    }

    #[inline]
    pub const fn len(self) -> usize {
        let range = self.range();
        range.end - range.start
    }

    /// Largest value an octal field can carry once the terminating NUL is
    /// accounted for.
    pub const fn max_octal(self) -> u64 {
        (1u64 << (3 * (self.len() - 1))) - 1
    }
}

/// Value of the typeflag byte.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum EntryType {
    Regular,
    Symlink,
    Directory,
    GlobalHeader,
    ExtendedHeader,
    Other(u8),
}

impl EntryType {
    pub fn from_byte(byte: u8) -> EntryType {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'2' => EntryType::Symlink,
            b'5' => EntryType::Directory,
            b'g' => EntryType::GlobalHeader,
            b'x' => EntryType::ExtendedHeader,
            other => EntryType::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Symlink => b'2',
            EntryType::Directory => b'5',
            EntryType::GlobalHeader => b'g',
            EntryType::ExtendedHeader => b'x',
            EntryType::Other(byte) => byte,
        }
    }

    /// Pax headers describe other entries and carry records, not file data.
    pub fn is_pax(self) -> bool {
        matches!(self, EntryType::GlobalHeader | EntryType::ExtendedHeader)
    }
}

/// Parse an ASCII octal field.
///
/// Leading spaces and trailing NUL/space padding are skipped. Every byte in
/// between must be an octal digit; anything else is an error rather than the
/// end of the number. An all-padding field decodes as zero.
pub fn parse_octal(field: &[u8]) -> Result<u64, OctalError> {
    let start = field
        .iter()
        .position(|&b| b != b' ')
        .unwrap_or(field.len());
    let end = field
        .iter()
        .rposition(|&b| b != b'\0' && b != b' ')
        .map_or(start, |last| last + 1)
        .max(start);

    let mut value: u64 = 0;
    for (position, &byte) in field.iter().enumerate().take(end).skip(start) {
        if !(b'0'..=b'7').contains(&byte) {
            return Err(OctalError::InvalidDigit { byte, position });
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or(OctalError::Overflow)?;
    }
    Ok(value)
}

/// One 512-byte ustar header block.
#[derive(Clone, PartialEq, Eq)]
pub struct UstarHeader {
    block: [u8; BLOCK_SIZE],
}

impl UstarHeader {
    /// An empty header carrying the ustar magic and version.
    pub fn new() -> Self {
        let mut header = Self::zeroed();
        header.field_mut(Field::Magic).copy_from_slice(USTAR_MAGIC);
        header.field_mut(Field::Version).copy_from_slice(USTAR_VERSION);
        header
    }

    /// The all-zero block used as end-of-archive marker.
    pub const fn zeroed() -> Self {
        Self {
            block: [0u8; BLOCK_SIZE],
        }
    }

    pub const fn from_block(block: [u8; BLOCK_SIZE]) -> Self {
        Self { block }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.block
    }

    /// Whether every byte of the block is zero.
    pub fn is_empty(&self) -> bool {
        self.block.iter().all(|&b| b == 0)
    }

    #[inline]
    pub fn field(&self, field: Field) -> &[u8] {
        &self.block[field.range()]
    }

    #[inline]
    fn field_mut(&mut self, field: Field) -> &mut [u8] {
        &mut self.block[field.range()]
    }

    /// Raw string field up to its first NUL. A field filled to its full
    /// width carries no terminator.
    pub fn str_field(&self, field: Field) -> &[u8] {
        let bytes = self.field(field);
        match bytes.find_byte(0) {
            Some(end) => &bytes[..end],
            None => bytes,
        }
    }

    /// Store raw bytes, zero-filling the remainder of the field.
    pub fn set_bytes(&mut self, field: Field, value: &[u8]) -> Result<(), HeaderError> {
        if value.len() > field.len() {
            return Err(HeaderError::FieldOverflow {
                field,
                len: value.len(),
            });
        }
        let slot = self.field_mut(field);
        slot.fill(0);
        slot[..value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Store a zero-padded octal number followed by a NUL terminator.
    ///
    /// Values that need more digits than the field holds are rejected, never
    /// truncated.
    pub fn set_octal(&mut self, field: Field, value: u64) -> Result<(), HeaderError> {
        let width = field.len() - 1;
        let digits = format!("{value:0width$o}");
        if digits.len() > width {
            return Err(HeaderError::NumericOverflow { field, value });
        }
        let slot = self.field_mut(field);
        slot[..width].copy_from_slice(digits.as_bytes());
        slot[width] = 0;
        Ok(())
    }

    pub fn octal(&self, field: Field) -> Result<u64, FieldError> {
        parse_octal(self.field(field)).map_err(|kind| FieldError { field, kind })
    }

    pub fn mode(&self) -> Result<u32, FieldError> {
        self.narrow(Field::Mode)
    }

    pub fn uid(&self) -> Result<u32, FieldError> {
        self.narrow(Field::Uid)
    }

    pub fn gid(&self) -> Result<u32, FieldError> {
        self.narrow(Field::Gid)
    }

    pub fn size(&self) -> Result<u64, FieldError> {
        self.octal(Field::Size)
    }

    pub fn mtime(&self) -> Result<u64, FieldError> {
        self.octal(Field::Mtime)
    }

    fn narrow(&self, field: Field) -> Result<u32, FieldError> {
        let value = self.octal(field)?;
        u32::try_from(value).map_err(|_| FieldError {
            field,
            kind: OctalError::Overflow,
        })
    }

    pub fn set_mode(&mut self, mode: u32) -> Result<(), HeaderError> {
        self.set_octal(Field::Mode, u64::from(mode))
    }

    pub fn set_uid(&mut self, uid: u32) -> Result<(), HeaderError> {
        self.set_octal(Field::Uid, u64::from(uid))
    }

    pub fn set_gid(&mut self, gid: u32) -> Result<(), HeaderError> {
        self.set_octal(Field::Gid, u64::from(gid))
    }

    pub fn set_size(&mut self, size: u64) -> Result<(), HeaderError> {
        self.set_octal(Field::Size, size)
    }

    pub fn set_mtime(&mut self, mtime: u64) -> Result<(), HeaderError> {
        self.set_octal(Field::Mtime, mtime)
    }

    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.block[Field::Typeflag.range().start])
    }

    pub fn set_entry_type(&mut self, entry_type: EntryType) {
        self.block[Field::Typeflag.range().start] = entry_type.as_byte();
    }

    /// Whether the magic field announces POSIX ustar (and thus a prefix field).
    pub fn is_ustar(&self) -> bool {
        self.field(Field::Magic) == USTAR_MAGIC
    }

    /// Store a path, splitting it across the prefix and name fields when it
    /// is longer than the name field.
    pub fn set_path(&mut self, path: &[u8]) -> Result<(), HeaderError> {
        if path.len() <= Field::Name.len() {
            self.set_bytes(Field::Prefix, b"")?;
            return self.set_bytes(Field::Name, path);
        }
        let (prefix, name) =
            split_path(path).ok_or(HeaderError::PathTooLong { len: path.len() })?;
        self.set_bytes(Field::Prefix, prefix)?;
        self.set_bytes(Field::Name, name)
    }

    /// Full path, joining prefix and name for ustar headers.
    pub fn path(&self) -> Vec<u8> {
        let name = self.str_field(Field::Name);
        let prefix = if self.is_ustar() {
            self.str_field(Field::Prefix)
        } else {
            b""
        };
        if prefix.is_empty() {
            return name.to_vec();
        }
        let mut path = Vec::with_capacity(prefix.len() + 1 + name.len());
        path.extend_from_slice(prefix);
        path.push(b'/');
        path.extend_from_slice(name);
        path
    }

    pub fn link_name(&self) -> &[u8] {
        self.str_field(Field::Linkname)
    }

    /// Header checksum: the byte sum with the checksum field read as spaces.
    pub fn checksum(&self) -> u64 {
        let range = Field::Checksum.range();
        self.block
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                if range.contains(&i) {
                    u64::from(b' ')
                } else {
                    u64::from(b)
                }
            })
            .sum()
    }

    /// Compute and store the checksum. Call after every other field is set.
    pub fn finalize(&mut self) -> Result<(), HeaderError> {
        let sum = self.checksum();
        self.set_octal(Field::Checksum, sum)
    }
}

impl Default for UstarHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UstarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarHeader")
            .field("path", &self.path().as_bstr())
            .field("typeflag", &self.entry_type())
            .field("size", &self.field(Field::Size).as_bstr())
            .finish_non_exhaustive()
    }
}

/// Find a `/` splitting `path` into a prefix of at most 155 bytes and a
/// non-empty name of at most 100 bytes.
fn split_path(path: &[u8]) -> Option<(&[u8], &[u8])> {
    let first = path.len().checked_sub(Field::Name.len() + 1)?;
    let last = Field::Prefix.len().min(path.len().checked_sub(2)?);
    (first..=last)
        .find(|&i| path[i] == b'/')
        .map(|i| (&path[..i], &path[i + 1..]))
}
