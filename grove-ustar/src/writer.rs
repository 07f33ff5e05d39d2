// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::io::{self, Write};

use crate::error::HeaderError;
use crate::header::{BLOCK_SIZE, EntryType, Field, RECORD_SIZE, UstarHeader};

const ZEROES: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Block-aligned tar output.
///
/// Headers and data are written as they arrive; [`TarWriter::finish`] appends
/// the two empty blocks that end the archive and pads it to a full record.
pub struct TarWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> TarWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Write a finalized header followed by `data`, padded to the block size.
    pub fn append(&mut self, header: &UstarHeader, data: &[u8]) -> io::Result<()> {
        self.write_raw(header.as_bytes())?;
        self.write_raw(data)?;
        self.pad_block()
    }

    /// Write a pax header of the given type carrying `records`.
    ///
    /// `template` supplies the mode, owner and mtime of the pax header itself;
    /// its name, type, size and checksum are replaced.
    pub fn append_pax(
        &mut self,
        entry_type: EntryType,
        name: &[u8],
        template: &UstarHeader,
        records: &[u8],
    ) -> io::Result<()> {
        debug_assert!(entry_type.is_pax());
        let header = pax_header(entry_type, name, template, records.len() as u64)
            .map_err(io::Error::other)?;
        self.append(&header, records)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn pad_block(&mut self) -> io::Result<()> {
        let tail = (self.offset % BLOCK_SIZE as u64) as usize;
        if tail != 0 {
            self.write_raw(&ZEROES[tail..])?;
        }
        Ok(())
    }

    /// Write the end-of-archive marker, pad to [`RECORD_SIZE`] and hand back
    /// the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.write_raw(&ZEROES)?;
        self.write_raw(&ZEROES)?;
        let tail = (self.offset % RECORD_SIZE as u64) as usize;
        if tail != 0 {
            let mut remaining = RECORD_SIZE - tail;
            while remaining > 0 {
                let n = remaining.min(BLOCK_SIZE);
                self.write_raw(&ZEROES[..n])?;
                remaining -= n;
            }
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn pax_header(
    entry_type: EntryType,
    name: &[u8],
    template: &UstarHeader,
    size: u64,
) -> Result<UstarHeader, HeaderError> {
    let mut header = template.clone();
    header.set_entry_type(entry_type);
    header.set_path(name)?;
    header.set_bytes(Field::Linkname, b"")?;
    header.set_size(size)?;
    header.finalize()?;
    Ok(header)
}
