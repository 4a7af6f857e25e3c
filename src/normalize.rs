//! Comment stripping ahead of scanning.
//!
//! Comments are blanked rather than removed: every comment character becomes
//! spaces of the same UTF-8 width and newlines stay in place. The normalized
//! buffer therefore has exactly the byte length and line structure of the
//! input, so an offset found while scanning it is also an offset into the
//! original buffer.
//!
//! Markup only has `<!-- -->` comments; `//`, `/* */` and `#` are only
//! recognized in script.

use crate::terms::ScanContext;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Str(char),
    Line,
    Block,
    Markup,
}

/// Blank the comments of `text` written in `context`.
///
/// Never fails: an unterminated block or markup comment runs to end of input.
pub fn normalize(text: &str, context: ScanContext) -> String {
    let script = context == ScanContext::Script;
    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut prev: Option<char> = None;
    let mut line_blank = true;
    let mut iter = text.char_indices().peekable();

    while let Some((i, ch)) = iter.next() {
        let rest = &text[i..];
        match state {
            State::Code => {
                if rest.starts_with("<!--") {
                    state = State::Markup;
                    blank(&mut out, ch);
                } else if !script {
                    out.push(ch);
                } else if rest.starts_with("/*") {
                    state = State::Block;
                    blank(&mut out, ch);
                } else if rest.starts_with("//") && prev != Some(':') {
                    state = State::Line;
                    blank(&mut out, ch);
                } else if ch == '#' && line_blank && is_hash_comment(&rest[1..]) {
                    state = State::Line;
                    blank(&mut out, ch);
                } else if opens_string(ch, prev) {
                    state = State::Str(ch);
                    out.push(ch);
                } else {
                    out.push(ch);
                }
            }
            State::Str(quote) => {
                out.push(ch);
                if ch == '\\' {
                    if let Some((_, escaped)) = iter.next() {
                        out.push(escaped);
                        prev = Some(escaped);
                        continue;
                    }
                } else if ch == quote || (ch == '\n' && quote != '`') {
                    state = State::Code;
                }
            }
            State::Line => {
                if ch == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Block => {
                if rest.starts_with("*/") {
                    blank(&mut out, '*');
                    if let Some((_, slash)) = iter.next() {
                        blank(&mut out, slash);
                    }
                    state = State::Code;
                    prev = Some(' ');
                    continue;
                }
                blank(&mut out, ch);
            }
            State::Markup => {
                if rest.starts_with("-->") {
                    for _ in 0..2 {
                        if let Some((_, c)) = iter.next() {
                            blank(&mut out, c);
                        }
                    }
                    blank(&mut out, ch);
                    state = State::Code;
                    prev = Some(' ');
                    continue;
                }
                blank(&mut out, ch);
            }
        }

        if ch == '\n' {
            line_blank = true;
        } else if !ch.is_whitespace() {
            line_blank = false;
        }
        prev = Some(ch);
    }

    out
}

fn blank(out: &mut String, ch: char) {
    if ch == '\n' || ch == '\r' {
        out.push(ch);
    } else {
        for _ in 0..ch.len_utf8() {
            out.push(' ');
        }
    }
}

fn is_hash_comment(after: &str) -> bool {
    after.is_empty() || after.starts_with(' ') || after.starts_with('\n') || after.starts_with("\r\n")
}

/// An apostrophe glued to a word (`Don't`) is prose, not a string opener.
fn opens_string(ch: char, prev: Option<char>) -> bool {
    match ch {
        '"' | '`' => true,
        '\'' => !matches!(prev, Some(p) if p.is_ascii_alphanumeric()),
        _ => false,
    }
}
