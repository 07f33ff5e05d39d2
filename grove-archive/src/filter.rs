// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Conversion of file content on its way into the archive.

use std::str::FromStr;

use derive_more::Display;
use memchr::memchr;
use serde::Deserialize;

use crate::error::ContentError;

/// Rewrites regular-file content before keyword substitution.
pub trait ContentFilter {
    fn apply(&self, path: &[u8], content: Vec<u8>) -> Result<Vec<u8>, ContentError>;
}

/// Leaves content as stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl ContentFilter for Passthrough {
    fn apply(&self, _path: &[u8], content: Vec<u8>) -> Result<Vec<u8>, ContentError> {
        Ok(content)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[display("lf")]
    Lf,
    #[display("crlf")]
    Crlf,
}

impl FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lf" => Ok(LineEnding::Lf),
            "crlf" => Ok(LineEnding::Crlf),
            other => Err(format!("unknown line ending '{other}', expected 'lf' or 'crlf'")),
        }
    }
}

/// Normalizes line endings of text content. Content with a NUL byte is
/// considered binary and left untouched.
#[derive(Debug, Clone, Copy)]
pub struct LineEndings(pub LineEnding);

impl ContentFilter for LineEndings {
    fn apply(&self, _path: &[u8], content: Vec<u8>) -> Result<Vec<u8>, ContentError> {
        if memchr(0, &content).is_some() {
            return Ok(content);
        }
        Ok(match self.0 {
            LineEnding::Lf => to_lf(content),
            LineEnding::Crlf => to_crlf(content),
        })
    }
}

fn to_lf(content: Vec<u8>) -> Vec<u8> {
    if !content.windows(2).any(|w| w == b"\r\n") {
        return content;
    }
    let mut out = Vec::with_capacity(content.len());
    let mut rest = content.as_slice();
    while let Some(i) = memchr(b'\r', rest) {
        out.extend_from_slice(&rest[..i]);
        if rest.get(i + 1) != Some(&b'\n') {
            out.push(b'\r');
        }
        rest = &rest[i + 1..];
    }
    out.extend_from_slice(rest);
    out
}

fn to_crlf(content: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + content.len() / 16);
    let mut start = 0;
    while let Some(i) = memchr(b'\n', &content[start..]).map(|i| start + i) {
        out.extend_from_slice(&content[start..i]);
        if i == 0 || content[i - 1] != b'\r' {
            out.push(b'\r');
        }
        out.push(b'\n');
        start = i + 1;
    }
    out.extend_from_slice(&content[start..]);
    out
}

#[cfg(test)]
mod unittests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LineEnding::Lf, "a\r\nb\r\n", "a\nb\n")]
    #[case(LineEnding::Lf, "lone\rcr\r\n", "lone\rcr\n")]
    #[case(LineEnding::Crlf, "a\nb\n", "a\r\nb\r\n")]
    #[case(LineEnding::Crlf, "mixed\r\nend\n", "mixed\r\nend\r\n")]
    #[case(LineEnding::Crlf, "\n", "\r\n")]
    fn converts_text(#[case] eol: LineEnding, #[case] input: &str, #[case] expected: &str) {
        let out = LineEndings(eol).apply(b"f", input.as_bytes().to_vec()).unwrap();
        assert_eq!(out, expected.as_bytes());
    }

    #[test]
    fn binary_is_untouched() {
        let input = b"\x00\n\r\n".to_vec();
        for eol in [LineEnding::Lf, LineEnding::Crlf] {
            assert_eq!(LineEndings(eol).apply(b"f", input.clone()).unwrap(), input);
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("crlf".parse::<LineEnding>().unwrap(), LineEnding::Crlf);
        assert!("cr".parse::<LineEnding>().is_err());
        assert_eq!(LineEnding::Lf.to_string(), "lf");
    }
}
