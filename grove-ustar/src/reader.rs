// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::io::{self, Read};

use bstr::ByteSlice as _;
use tracing::{debug, warn};

use crate::error::{FieldError, FormatError, OctalError};
use crate::header::{BLOCK_SIZE, EntryType, Field, UstarHeader};
use crate::pax;

/// Irregularities that do not stop the reader but that a consumer may care
/// about.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Anomaly {
    /// A single empty block followed by another header. The block is skipped.
    LoneEmptyBlock { offset: u64 },
    /// The input ended without the two empty blocks closing the archive.
    Truncated { offset: u64, empty_blocks: usize },
}

/// One archive member with its pax overrides applied.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Offset of the ustar header block (after any extended header).
    pub offset: u64,
    pub header: UstarHeader,
    pub entry_type: EntryType,
    pub path: Vec<u8>,
    pub link_target: Vec<u8>,
    pub uname: Vec<u8>,
    pub gname: Vec<u8>,
    pub size: u64,
    pub data: Vec<u8>,
}

impl Entry {
    /// Records of a global pax header, e.g. the `comment` naming a commit.
    pub fn pax_records(&self) -> pax::Records<'_> {
        pax::records(&self.data)
    }
}

#[derive(Default)]
struct Overrides {
    path: Option<Vec<u8>>,
    link_target: Option<Vec<u8>>,
    uname: Option<Vec<u8>>,
    gname: Option<Vec<u8>>,
    size: Option<u64>,
}

/// Sequential reader over a tar stream.
///
/// Extended (`x`) headers are folded into the entry they describe; global
/// (`g`) headers are yielded as entries so their records stay visible.
pub struct TarReader<R> {
    inner: R,
    offset: u64,
    empty_run: usize,
    empty_runs: Vec<usize>,
    anomalies: Vec<Anomaly>,
    finished: bool,
}

enum Block {
    Full(Box<[u8; BLOCK_SIZE]>),
    Partial(usize),
    Eof,
}

impl<R: Read> TarReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            empty_run: 0,
            empty_runs: Vec::new(),
            anomalies: Vec::new(),
            finished: false,
        }
    }

    /// Byte offset of the next unread block.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of every completed run of consecutive empty blocks, in order.
    pub fn empty_block_runs(&self) -> &[usize] {
        &self.empty_runs
    }

    /// Empty blocks seen since the last header.
    pub fn consecutive_empty_blocks(&self) -> usize {
        self.empty_run
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Whether the reader stopped at a proper end-of-archive marker.
    pub fn is_clean_end(&self) -> bool {
        self.finished && !matches!(self.anomalies.last(), Some(Anomaly::Truncated { .. }))
    }

    fn read_block(&mut self) -> Result<Block, FormatError> {
        let mut block = Box::new([0u8; BLOCK_SIZE]);
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.inner.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => {
                    return Err(FormatError::Io {
                        offset: self.offset,
                        source,
                    });
                }
            }
        }
        Ok(match filled {
            0 => Block::Eof,
            BLOCK_SIZE => {
                self.offset += BLOCK_SIZE as u64;
                Block::Full(block)
            }
            n => Block::Partial(n),
        })
    }

    fn read_data(&mut self, header_offset: u64, size: u64) -> Result<Vec<u8>, FormatError> {
        let len = usize::try_from(size).map_err(|_| FormatError::Field {
            offset: header_offset,
            source: FieldError {
                field: Field::Size,
                kind: OctalError::Overflow,
            },
        })?;
        let mut data = Vec::with_capacity(len.min(1 << 20));
        let mut remaining = len;
        while remaining > 0 {
            match self.read_block()? {
                Block::Full(block) => {
                    let n = remaining.min(BLOCK_SIZE);
                    data.extend_from_slice(&block[..n]);
                    remaining -= n;
                }
                Block::Partial(_) | Block::Eof => {
                    self.finished = true;
                    return Err(FormatError::TruncatedData {
                        offset: header_offset,
                        expected: size,
                    });
                }
            }
        }
        Ok(data)
    }

    fn end_of_input(&mut self, partial: usize) {
        let empty_blocks = self.empty_run;
        if empty_blocks > 0 {
            self.empty_runs.push(empty_blocks);
        }
        if empty_blocks < 2 || partial > 0 {
            warn!(
                offset = self.offset,
                empty_blocks, "tar stream ends without an end-of-archive marker"
            );
            self.anomalies.push(Anomaly::Truncated {
                offset: self.offset,
                empty_blocks,
            });
        }
        self.finished = true;
    }

    /// Read the next header block, skipping empty blocks. Returns `None` once
    /// the archive has ended.
    fn next_header(&mut self) -> Result<Option<(u64, UstarHeader)>, FormatError> {
        loop {
            let block = match self.read_block()? {
                Block::Full(block) => block,
                Block::Partial(n) => {
                    self.end_of_input(n);
                    return Ok(None);
                }
                Block::Eof => {
                    self.end_of_input(0);
                    return Ok(None);
                }
            };
            let offset = self.offset - BLOCK_SIZE as u64;
            let header = UstarHeader::from_block(*block);
            if header.is_empty() {
                self.empty_run += 1;
                if self.empty_run == 2 {
                    debug!(offset, "end of archive");
                    self.empty_runs.push(self.empty_run);
                    self.empty_run = 0;
                    self.finished = true;
                    return Ok(None);
                }
                continue;
            }
            if self.empty_run > 0 {
                let lone = offset - BLOCK_SIZE as u64;
                warn!(offset = lone, "skipping lone empty block");
                self.anomalies.push(Anomaly::LoneEmptyBlock { offset: lone });
                self.empty_runs.push(self.empty_run);
                self.empty_run = 0;
            }
            check_checksum(offset, &header)?;
            return Ok(Some((offset, header)));
        }
    }

    /// Read the next entry, or `None` at the end of the archive.
    pub fn next_entry(&mut self) -> Result<Option<Entry>, FormatError> {
        let mut overrides = Overrides::default();
        while !self.finished {
            let Some((offset, header)) = self.next_header()? else {
                break;
            };
            let field = |source| FormatError::Field { offset, source };
            let entry_type = header.entry_type();
            let size = match overrides.size {
                Some(size) if !entry_type.is_pax() => size,
                _ => header.size().map_err(field)?,
            };
            let data = self.read_data(offset, size)?;

            if entry_type == EntryType::ExtendedHeader {
                apply_records(offset, &data, &mut overrides)?;
                continue;
            }
            if entry_type == EntryType::GlobalHeader {
                // validate only; global records are surfaced to the caller
                pax::records(&data)
                    .try_for_each(|r| r.map(drop))
                    .map_err(|reason| FormatError::Pax { offset, reason })?;
            }

            let path = overrides.path.take().unwrap_or_else(|| header.path());
            let link_target = overrides
                .link_target
                .take()
                .unwrap_or_else(|| header.link_name().to_vec());
            let uname = overrides
                .uname
                .take()
                .unwrap_or_else(|| header.str_field(Field::Uname).to_vec());
            let gname = overrides
                .gname
                .take()
                .unwrap_or_else(|| header.str_field(Field::Gname).to_vec());
            // decode the remaining numeric fields so malformed headers fail here
            header.mode().map_err(field)?;
            header.uid().map_err(field)?;
            header.gid().map_err(field)?;
            header.mtime().map_err(field)?;

            debug!(offset, path = %path.as_bstr(), size, "tar entry");
            return Ok(Some(Entry {
                offset,
                header,
                entry_type,
                path,
                link_target,
                uname,
                gname,
                size,
                data,
            }));
        }
        Ok(None)
    }
}

impl<R: Read> Iterator for TarReader<R> {
    type Item = Result<Entry, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn check_checksum(offset: u64, header: &UstarHeader) -> Result<(), FormatError> {
    let recorded = header
        .octal(Field::Checksum)
        .map_err(|source| FormatError::Field { offset, source })?;
    let computed = header.checksum();
    if recorded != computed {
        return Err(FormatError::Checksum {
            offset,
            recorded,
            computed,
        });
    }
    Ok(())
}

fn apply_records(offset: u64, data: &[u8], overrides: &mut Overrides) -> Result<(), FormatError> {
    for record in pax::records(data) {
        let record = record.map_err(|reason| FormatError::Pax { offset, reason })?;
        match record.key {
            b"path" => overrides.path = Some(record.value.to_vec()),
            b"linkpath" => overrides.link_target = Some(record.value.to_vec()),
            b"uname" => overrides.uname = Some(record.value.to_vec()),
            b"gname" => overrides.gname = Some(record.value.to_vec()),
            b"size" => {
                let size = std::str::from_utf8(record.value)
                    .ok()
                    .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or_else(|| FormatError::Pax {
                        offset,
                        reason: format!("invalid size {:?}", record.value.as_bstr()),
                    })?;
                overrides.size = Some(size);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Outcome of reading a whole stream with [`verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub entries: usize,
    pub data_bytes: u64,
    pub empty_block_runs: Vec<usize>,
    pub anomalies: Vec<Anomaly>,
}

impl VerifySummary {
    pub fn is_truncated(&self) -> bool {
        self.anomalies
            .iter()
            .any(|a| matches!(a, Anomaly::Truncated { .. }))
    }
}

/// Read a tar stream to its end, calling `on_entry` for every member.
pub fn verify<R, F>(input: R, mut on_entry: F) -> Result<VerifySummary, FormatError>
where
    R: Read,
    F: FnMut(&Entry),
{
    let mut reader = TarReader::new(input);
    let mut summary = VerifySummary::default();
    while let Some(entry) = reader.next_entry()? {
        summary.entries += 1;
        summary.data_bytes += entry.size;
        on_entry(&entry);
    }
    summary.empty_block_runs = reader.empty_block_runs().to_vec();
    summary.anomalies = reader.anomalies().to_vec();
    Ok(summary)
}
