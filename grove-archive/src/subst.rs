// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! `$Format:...$` keyword substitution.

use memchr::{memchr, memmem};

use crate::pretty::ContentRenderer;

const MARKER: &[u8] = b"$Format:";

/// Replace every `$Format:<template>$` in `content` with `template`
/// rendered by `renderer`.
///
/// Markers are processed left to right and rendered text is never scanned
/// again. A marker without a closing `$` ends the scan and is kept as is,
/// together with everything after it. Content without markers is returned
/// untouched.
pub fn substitute<R>(renderer: &R, content: Vec<u8>) -> Vec<u8>
where
    R: ContentRenderer + ?Sized,
{
    let finder = memmem::Finder::new(MARKER);
    if finder.find(&content).is_none() {
        return content;
    }

    let mut out = Vec::with_capacity(content.len());
    let mut rest = content.as_slice();
    while let Some(start) = finder.find(rest) {
        let template_start = start + MARKER.len();
        let Some(len) = memchr(b'$', &rest[template_start..]) else {
            break;
        };
        out.extend_from_slice(&rest[..start]);
        renderer.render(&rest[template_start..template_start + len], &mut out);
        rest = &rest[template_start + len + 1..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod unittests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    /// Renders a template as `<template>` so tests can see what was passed.
    struct Angle;

    impl ContentRenderer for Angle {
        fn render(&self, template: &[u8], out: &mut Vec<u8>) {
            out.push(b'<');
            out.extend_from_slice(template);
            out.push(b'>');
        }
    }

    /// Renders every template as another marker.
    struct Echo;

    impl ContentRenderer for Echo {
        fn render(&self, _template: &[u8], out: &mut Vec<u8>) {
            out.extend_from_slice(b"$Format:%H$");
        }
    }

    #[rstest]
    #[case("hi $Format:%H$", "hi <%H>")]
    #[case("$Format:a$$Format:b$", "<a><b>")]
    #[case("x $Format:$ y", "x <> y")]
    #[case("$Format:a$ and $Format:unclosed", "<a> and $Format:unclosed")]
    #[case("$Format:unclosed $Format:b$", "<unclosed >Format:b$")]
    #[case("$Form $Format", "$Form $Format")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        let out = substitute(&Angle, input.as_bytes().to_vec());
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn rendered_output_is_not_rescanned() {
        let out = substitute(&Echo, b"$Format:x$".to_vec());
        assert_eq!(out, b"$Format:%H$");
    }

    proptest! {
        #[test]
        fn content_without_marker_is_unchanged(content in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assume!(memmem::find(&content, MARKER).is_none());
            prop_assert_eq!(substitute(&Angle, content.clone()), content);
        }

        #[test]
        fn substitution_is_deterministic(prefix in ".{0,16}", template in "[^$]{0,8}", suffix in ".{0,16}") {
            let input = format!("{prefix}$Format:{template}${suffix}").into_bytes();
            let first = substitute(&Angle, input.clone());
            let second = substitute(&Angle, input);
            prop_assert_eq!(first, second);
        }
    }
}
