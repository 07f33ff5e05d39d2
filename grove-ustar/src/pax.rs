// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Pax extended header records.
//!
//! A record is `"<len> <key>=<value>\n"` where `<len>` is the decimal length
//! of the whole record, its own digits included.

use bstr::ByteSlice as _;

/// Key carrying a path that does not fit the ustar name/prefix fields.
pub const PATH: &str = "path";
/// Key carrying a link target longer than the linkname field.
pub const LINKPATH: &str = "linkpath";
/// Key carrying a size beyond the 11-digit octal size field.
pub const SIZE: &str = "size";
/// Owner name longer than the uname field.
pub const UNAME: &str = "uname";
/// Group name longer than the gname field.
pub const GNAME: &str = "gname";
/// Free-form comment; archives bound to a commit record its id here.
pub const COMMENT: &str = "comment";

/// Append one record to `buf`.
pub fn push_record(buf: &mut Vec<u8>, key: &str, value: &[u8]) {
    // space, '=' and newline
    let body = key.len() + value.len() + 3;
    let mut digits = 1;
    while decimal_len(body + digits) != digits {
        digits += 1;
    }
    buf.extend_from_slice((body + digits).to_string().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(key.as_bytes());
    buf.push(b'=');
    buf.extend_from_slice(value);
    buf.push(b'\n');
}

fn decimal_len(mut n: usize) -> usize {
    let mut len = 1;
    while n >= 10 {
        n /= 10;
        len += 1;
    }
    len
}

/// One decoded record, borrowing from the extended header data.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Record<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Iterator over the records of an extended header's data.
///
/// Stops at the end of the data or at NUL padding. A malformed record yields
/// one error and ends the iteration.
pub struct Records<'a> {
    data: &'a [u8],
    failed: bool,
}

pub fn records(data: &[u8]) -> Records<'_> {
    Records {
        data,
        failed: false,
    }
}

impl<'a> Records<'a> {
    fn parse_next(&mut self) -> Result<Record<'a>, String> {
        let space = self
            .data
            .find_byte(b' ')
            .ok_or_else(|| "record length is not terminated by a space".to_string())?;
        let digits = &self.data[..space];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(format!("invalid record length {:?}", digits.as_bstr()));
        }
        let len = digits
            .iter()
            .try_fold(0usize, |acc, &d| {
                acc.checked_mul(10)?.checked_add(usize::from(d - b'0'))
            })
            .ok_or_else(|| "record length overflows".to_string())?;
        if len <= space + 1 || len > self.data.len() {
            return Err(format!(
                "record length {len} does not fit in {} remaining bytes",
                self.data.len()
            ));
        }
        let record = &self.data[space + 1..len];
        let Some(body) = record.strip_suffix(b"\n") else {
            return Err("record is not terminated by a newline".to_string());
        };
        let eq = body
            .find_byte(b'=')
            .ok_or_else(|| format!("record {:?} has no '='", body.as_bstr()))?;
        self.data = &self.data[len..];
        Ok(Record {
            key: &body[..eq],
            value: &body[eq + 1..],
        })
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.is_empty() || self.data[0] == 0 {
            return None;
        }
        let result = self.parse_next();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}
