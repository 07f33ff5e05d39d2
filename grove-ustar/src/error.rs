// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::io;

use thiserror::Error;

use crate::header::Field;

/// Failure to decode an ASCII octal field.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum OctalError {
    #[error("invalid octal digit {byte:#04x} at position {position}")]
    InvalidDigit { byte: u8, position: usize },
    #[error("value does not fit in 64 bits")]
    Overflow,
}

/// A decode failure local to one header field.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("{field} field: {kind}")]
pub struct FieldError {
    pub field: Field,
    #[source]
    pub kind: OctalError,
}

/// Errors raised while filling in a header for output.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum HeaderError {
    #[error("value {value:#o} does not fit in the {field} field")]
    NumericOverflow { field: Field, value: u64 },

    #[error("{len} bytes do not fit in the {field} field")]
    FieldOverflow { field: Field, len: usize },

    #[error("path of {len} bytes cannot be split into ustar prefix and name")]
    PathTooLong { len: usize },
}

/// Errors raised while reading a tar stream.
///
/// Every variant carries the byte offset of the block it concerns.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("malformed header at offset {offset}: {source}")]
    Field {
        offset: u64,
        #[source]
        source: FieldError,
    },

    #[error("checksum mismatch in header at offset {offset}: recorded {recorded:#o}, computed {computed:#o}")]
    Checksum {
        offset: u64,
        recorded: u64,
        computed: u64,
    },

    #[error("malformed pax record in header at offset {offset}: {reason}")]
    Pax { offset: u64, reason: String },

    #[error("entry at offset {offset} is truncated: expected {expected} data bytes")]
    TruncatedData { offset: u64, expected: u64 },

    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },
}

impl FormatError {
    /// Offset of the header block the error refers to.
    pub fn offset(&self) -> u64 {
        match self {
            FormatError::Field { offset, .. }
            | FormatError::Checksum { offset, .. }
            | FormatError::Pax { offset, .. }
            | FormatError::TruncatedData { offset, .. }
            | FormatError::Io { offset, .. } => *offset,
        }
    }

    /// Header field that failed to decode, when the error is field-local.
    pub fn field(&self) -> Option<Field> {
        match self {
            FormatError::Field { source, .. } => Some(source.field),
            FormatError::Checksum { .. } => Some(Field::Checksum),
            _ => None,
        }
    }
}
