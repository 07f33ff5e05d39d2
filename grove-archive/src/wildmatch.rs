// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Shell-style wildcard matching on byte paths.
//!
//! Supports `*`, `?`, bracket classes (`[abc]`, `[a-z]`, `[!x]`, `[^x]`) and
//! backslash escapes. In pathname mode `*` and `?` stop at `/`, while `**`
//! spans any number of directories and `**/` may match none.

/// Whether `pattern` contains a wildcard character.
pub fn has_wildcard(pattern: &[u8]) -> bool {
    pattern
        .iter()
        .any(|b| matches!(b, b'*' | b'?' | b'[' | b'\\'))
}

/// Length of the leading part of `pattern` free of wildcards.
pub fn literal_prefix_len(pattern: &[u8]) -> usize {
    pattern
        .iter()
        .position(|b| matches!(b, b'*' | b'?' | b'[' | b'\\'))
        .unwrap_or(pattern.len())
}

pub fn wildmatch(pattern: &[u8], text: &[u8], pathname: bool) -> bool {
    match_from(pattern, text, pathname) == Outcome::Match
}

/// Result of matching a pattern tail. The abort variants tell enclosing
/// stars that consuming more text cannot help, which keeps matching
/// polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Match,
    NoMatch,
    /// The text ran out; no enclosing star can succeed either.
    AbortAll,
    /// A star stopped at `/`; only an enclosing `**` may go on.
    AbortToDoubleStar,
}

fn match_from(p: &[u8], t: &[u8], pathname: bool) -> Outcome {
    let (mut pi, mut ti) = (0, 0);
    while pi < p.len() {
        if ti == t.len() && p[pi] != b'*' {
            return Outcome::AbortAll;
        }
        match p[pi] {
            b'*' => {
                let mut next = pi + 1;
                while next < p.len() && p[next] == b'*' {
                    next += 1;
                }
                let double = next - pi > 1;
                let crosses = !pathname || double;

                if pathname
                    && double
                    && p.get(next) == Some(&b'/')
                    && (pi == 0 || p[pi - 1] == b'/')
                    && match_from(&p[next + 1..], &t[ti..], pathname) == Outcome::Match
                {
                    return Outcome::Match;
                }
                if next == p.len() {
                    return if crosses || !t[ti..].contains(&b'/') {
                        Outcome::Match
                    } else {
                        Outcome::AbortToDoubleStar
                    };
                }
                for k in ti..t.len() {
                    match match_from(&p[next..], &t[k..], pathname) {
                        Outcome::NoMatch => {}
                        Outcome::AbortToDoubleStar if crosses => {}
                        other => return other,
                    }
                    if !crosses && t[k] == b'/' {
                        return Outcome::AbortToDoubleStar;
                    }
                }
                return Outcome::AbortAll;
            }
            b'?' => {
                if pathname && t[ti] == b'/' {
                    return Outcome::NoMatch;
                }
                pi += 1;
                ti += 1;
            }
            b'[' => match bracket(&p[pi..]) {
                Some(class) => {
                    let c = t[ti];
                    if (pathname && c == b'/') || !class.matches(c) {
                        return Outcome::NoMatch;
                    }
                    pi += class.len;
                    ti += 1;
                }
                None => {
                    if t[ti] != b'[' {
                        return Outcome::NoMatch;
                    }
                    pi += 1;
                    ti += 1;
                }
            },
            b'\\' if pi + 1 < p.len() => {
                if t[ti] != p[pi + 1] {
                    return Outcome::NoMatch;
                }
                pi += 2;
                ti += 1;
            }
            c => {
                if t[ti] != c {
                    return Outcome::NoMatch;
                }
                pi += 1;
                ti += 1;
            }
        }
    }
    if ti == t.len() {
        Outcome::Match
    } else {
        Outcome::NoMatch
    }
}

struct Bracket<'a> {
    negated: bool,
    body: &'a [u8],
    /// Pattern bytes consumed, brackets included.
    len: usize,
}

impl Bracket<'_> {
    fn matches(&self, c: u8) -> bool {
        let mut found = false;
        let mut i = 0;
        while i < self.body.len() {
            let mut lo = self.body[i];
            if lo == b'\\' && i + 1 < self.body.len() {
                i += 1;
                lo = self.body[i];
            }
            if i + 2 < self.body.len() && self.body[i + 1] == b'-' {
                let mut hi = self.body[i + 2];
                i += 2;
                if hi == b'\\' && i + 1 < self.body.len() {
                    i += 1;
                    hi = self.body[i];
                }
                found |= (lo..=hi).contains(&c);
            } else {
                found |= lo == c;
            }
            i += 1;
        }
        found != self.negated
    }
}

/// Parse a bracket class at the start of `p`; `None` if it is unterminated.
fn bracket(p: &[u8]) -> Option<Bracket<'_>> {
    let mut i = 1;
    let negated = matches!(p.get(i), Some(b'!' | b'^'));
    if negated {
        i += 1;
    }
    let start = i;
    // a `]` right after the opening bracket is literal
    if p.get(i) == Some(&b']') {
        i += 1;
    }
    while i < p.len() {
        match p[i] {
            b'\\' => i += 2,
            b']' => {
                return Some(Bracket {
                    negated,
                    body: &p[start..i],
                    len: i + 1,
                });
            }
            _ => i += 1,
        }
    }
    None
}
