// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Commit metadata and the `%`-placeholder renderer used by keyword
//! substitution.
//!
//! | Placeholder | Expands to |
//! |-------------|------------|
//! | `%H` `%h` | commit id, full or abbreviated |
//! | `%T` `%t` | tree id, full or abbreviated |
//! | `%P` `%p` | parent ids, full or abbreviated, space separated |
//! | `%an` `%ae` | author name and email (`%c..` for the committer) |
//! | `%ad` `%aD` `%at` `%ai` `%aI` `%as` | author date: default, RFC 2822, unix, ISO-like, strict ISO, short |
//! | `%s` `%b` `%B` | subject, body, raw message |
//! | `%d` `%D` | ref names, with or without ` (...)` wrapping |
//! | `%n` `%%` `%xNN` | newline, percent, byte in hex |
//!
//! Anything else is copied literally.

use chrono::{DateTime, FixedOffset, Offset as _, Utc};
use memchr::memchr;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::object::ObjectId;

const ABBREV_LEN: usize = 7;

/// Expands a keyword template into bytes.
pub trait ContentRenderer {
    fn render(&self, template: &[u8], out: &mut Vec<u8>);
}

/// The commit an archive is generated from.
pub trait Commit: ContentRenderer {
    /// Full hex id, as recorded in the archive comment.
    fn id(&self) -> String;

    /// Committer time in seconds since the epoch.
    fn commit_time(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the epoch.
    pub time: i64,
    /// UTC offset in minutes, written `+hhmm` / `-hhmm`.
    #[serde(default, deserialize_with = "deserialize_offset")]
    pub offset: i32,
}

fn deserialize_offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_offset(&raw).ok_or_else(|| D::Error::custom(format!("invalid UTC offset '{raw}'")))
}

/// Parse `+hhmm` / `-hhmm` into minutes.
pub fn parse_offset(raw: &str) -> Option<i32> {
    let (sign, digits) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    (minutes < 60).then_some(sign * (hours * 60 + minutes))
}

impl Signature {
    fn date(&self) -> DateTime<FixedOffset> {
        let offset =
            FixedOffset::east_opt(self.offset.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
        DateTime::from_timestamp(self.time, 0)
            .unwrap_or_default()
            .with_timezone(&offset)
    }

    /// Expand the person placeholder selected by `key`, if it is one.
    fn expand(&self, key: u8, out: &mut Vec<u8>) -> bool {
        let text = match key {
            b'n' => self.name.clone(),
            b'e' => self.email.clone(),
            b'd' => self.date().format("%a %b %-d %H:%M:%S %Y %z").to_string(),
            b'D' => self.date().format("%a, %-d %b %Y %H:%M:%S %z").to_string(),
            b't' => self.time.to_string(),
            b'i' => self.date().format("%Y-%m-%d %H:%M:%S %z").to_string(),
            b'I' => self.date().format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            b's' => self.date().format("%Y-%m-%d").to_string(),
            _ => return false,
        };
        out.extend_from_slice(text.as_bytes());
        true
    }
}

/// Metadata of one commit, as read from a TOML document.
///
/// ```toml
/// id = "ce013625030ba8dba906f756967f9e9ca394464a"
/// tree = "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
/// message = "Release 1.0\n"
///
/// [author]
/// name = "A U Thor"
/// email = "author@example.com"
/// time = 1112911993
/// offset = "-0700"
///
/// [committer]
/// name = "C O Mitter"
/// email = "committer@example.com"
/// time = 1112911993
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitInfo {
    pub id: ObjectId,
    pub tree: ObjectId,
    #[serde(default)]
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    #[serde(default)]
    pub message: String,
    /// Ref names pointing at the commit, for `%d` / `%D`.
    #[serde(default)]
    pub refs: Vec<String>,
}

impl CommitInfo {
    fn subject(&self) -> String {
        self.message
            .lines()
            .take_while(|line| !line.trim().is_empty())
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn body(&self) -> String {
        let mut lines = self.message.lines().skip_while(|line| line.trim().is_empty());
        for line in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
        }
        let body: Vec<&str> = lines.skip_while(|line| line.trim().is_empty()).collect();
        if body.is_empty() {
            String::new()
        } else {
            let mut body = body.join("\n");
            body.push('\n');
            body
        }
    }

    fn ids(ids: &[ObjectId], abbrev: bool) -> String {
        ids.iter()
            .map(|oid| {
                if abbrev {
                    oid.abbrev(ABBREV_LEN)
                } else {
                    oid.to_hex()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Expand the placeholder at the start of `spec` (the bytes after `%`).
    /// Returns how many bytes it consumed, zero if it is not a placeholder.
    fn expand(&self, spec: &[u8], out: &mut Vec<u8>) -> usize {
        let text = match spec {
            [b'H', ..] => self.id.to_hex(),
            [b'h', ..] => self.id.abbrev(ABBREV_LEN),
            [b'T', ..] => self.tree.to_hex(),
            [b't', ..] => self.tree.abbrev(ABBREV_LEN),
            [b'P', ..] => Self::ids(&self.parents, false),
            [b'p', ..] => Self::ids(&self.parents, true),
            [b'a', key, ..] => return if self.author.expand(*key, out) { 2 } else { 0 },
            [b'c', key, ..] => return if self.committer.expand(*key, out) { 2 } else { 0 },
            [b's', ..] => self.subject(),
            [b'b', ..] => self.body(),
            [b'B', ..] => self.message.clone(),
            [b'd', ..] if self.refs.is_empty() => String::new(),
            [b'd', ..] => format!(" ({})", self.refs.join(", ")),
            [b'D', ..] => self.refs.join(", "),
            [b'n', ..] => "\n".to_owned(),
            [b'%', ..] => "%".to_owned(),
            [b'x', hi, lo, ..] => {
                return match hex_byte(*hi, *lo) {
                    Some(byte) => {
                        out.push(byte);
                        3
                    }
                    None => 0,
                };
            }
            _ => return 0,
        };
        out.extend_from_slice(text.as_bytes());
        1
    }
}

fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    let digit = |c: u8| (c as char).to_digit(16);
    Some((digit(hi)? * 16 + digit(lo)?) as u8)
}

impl ContentRenderer for CommitInfo {
    fn render(&self, template: &[u8], out: &mut Vec<u8>) {
        let mut rest = template;
        while let Some(i) = memchr(b'%', rest) {
            out.extend_from_slice(&rest[..i]);
            let consumed = self.expand(&rest[i + 1..], out);
            if consumed == 0 {
                out.push(b'%');
            }
            rest = &rest[i + 1 + consumed..];
        }
        out.extend_from_slice(rest);
    }
}

impl Commit for CommitInfo {
    fn id(&self) -> String {
        self.id.to_hex()
    }

    fn commit_time(&self) -> i64 {
        self.committer.time
    }
}
