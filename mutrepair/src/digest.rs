// SPDX-License-Identifier: Apache-2.0

//! Code-only content digests.
//!
//! Two sources that differ only in comments or layout digest identically.
//! Canonicalization removes `//` and `/* */` comments (specification
//! annotations included) outside of string and character literals, then
//! drops whitespace except for a single space between two identifier
//! characters or between two operator characters. The latter keeps
//! `i++ + j` apart from `i + ++j`. Literal contents are kept as written.

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeDigest(blake3::Hash);

impl CodeDigest {
    pub fn of_source(source: &str) -> Self {
        CodeDigest(blake3::hash(canonicalize(source).as_bytes()))
    }

    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::of_source(&text))
    }

    /// Leading hex characters, for directory names and logs.
    pub fn short(&self) -> String {
        self.0.to_hex()[..12].to_string()
    }
}

impl fmt::Display for CodeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Literal(char),
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Characters that can combine with a neighbour into a longer token.
fn is_operator(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '%' | '<' | '>' | '=' | '!' | '&' | '|' | '^' | '~' | '?' | ':' | '.'
    )
}

fn needs_separator(prev: char, next: char) -> bool {
    (is_word(prev) && is_word(next)) || (is_operator(prev) && is_operator(next))
}

pub fn canonicalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut mode = Mode::Code;
    let mut pending_space = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match mode {
            Mode::LineComment => {
                if c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    mode = Mode::Code;
                }
            }
            Mode::Literal(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    mode = Mode::Code;
                }
            }
            Mode::Code => {
                if c.is_whitespace() {
                    pending_space = true;
                    continue;
                }
                if c == '/' {
                    match chars.peek() {
                        Some('/') => {
                            chars.next();
                            mode = Mode::LineComment;
                            pending_space = true;
                            continue;
                        }
                        Some('*') => {
                            chars.next();
                            mode = Mode::BlockComment;
                            pending_space = true;
                            continue;
                        }
                        _ => {}
                    }
                }
                let separate = out.chars().last().is_some_and(|prev| needs_separator(prev, c));
                if pending_space && separate {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
                if c == '"' || c == '\'' {
                    mode = Mode::Literal(c);
                }
            }
        }
    }
    out
}
