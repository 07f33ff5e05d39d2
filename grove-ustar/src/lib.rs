// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! POSIX ustar records.
//!
//! This crate owns the fixed 512-byte header layout shared by the archive
//! encoder and the verification reader:
//!
//! - [`UstarHeader`]: field layout, strict octal codec and checksum
//! - [`pax`]: extended header records (`path`, `linkpath`, `size`, `comment`)
//! - [`TarWriter`]: block-aligned output with end-of-archive trailer
//! - [`TarReader`]: entry iteration that counts empty-block runs and reports
//!   truncated streams instead of accepting them

mod error;
mod header;
pub mod pax;
mod reader;
mod writer;

pub use error::{FieldError, FormatError, HeaderError, OctalError};
pub use header::{BLOCK_SIZE, EntryType, Field, RECORD_SIZE, UstarHeader, parse_octal};
pub use reader::{Anomaly, Entry, TarReader, VerifySummary, verify};
pub use writer::TarWriter;
