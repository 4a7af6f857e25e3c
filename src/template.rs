//! Template interpolation converter.
//!
//! Turns `共${count}条记录` into the canonical key `共{a}条记录` and the call
//! `$t('共{a}条记录', { a: count })`. The same routine handles markup bodies
//! with `{{ expr }}` markers.

use crate::error::{Result, RewriteError};

/// Largest number of placeholders a single term can carry (`a`..=`z`)
pub const MAX_PLACEHOLDERS: usize = 26;

/// Interpolation marker flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSyntax {
    /// `${expr}` inside a backtick literal
    Dollar,
    /// `{{ expr }}` inside markup text
    Mustache,
}

/// Canonical form of a parameterized term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCall {
    /// Lookup key with placeholders (`共{a}条记录`), escapes resolved
    pub canonical_key: String,
    /// Ready-to-splice call (`$t('共{a}条记录', { a: count })`)
    pub call_expression: String,
    /// Placeholder name -> original expression, in marker order
    pub placeholders: Vec<(String, String)>,
}

#[derive(Debug)]
struct Marker {
    start: usize,
    end: usize,
    expression: String,
}

/// Canonicalize `text` and build the call for `lookup`.
///
/// Every marker gets its own letter, left to right, even when the expression
/// repeats. More than 26 markers is an error rather than a silent collision.
pub fn convert(text: &str, lookup: &str, syntax: MarkerSyntax, quote: char) -> Result<TemplateCall> {
    let markers = find_markers(text, syntax);
    if markers.len() > MAX_PLACEHOLDERS {
        return Err(RewriteError::PlaceholderOverflow {
            count: markers.len(),
        });
    }

    let mut raw_key = String::with_capacity(text.len());
    let mut placeholders = Vec::with_capacity(markers.len());
    let mut cursor = 0;
    for (index, marker) in markers.iter().enumerate() {
        let name = placeholder_name(index);
        raw_key.push_str(&text[cursor..marker.start]);
        raw_key.push('{');
        raw_key.push_str(&name);
        raw_key.push('}');
        placeholders.push((name, marker.expression.clone()));
        cursor = marker.end;
    }
    raw_key.push_str(&text[cursor..]);

    let literal = quote_literal(&raw_key, quote);
    let call_expression = if placeholders.is_empty() {
        format!("{}({})", lookup, literal)
    } else {
        let args: Vec<String> = placeholders
            .iter()
            .map(|(name, expr)| format!("{}: {}", name, expr))
            .collect();
        format!("{}({}, {{ {} }})", lookup, literal, args.join(", "))
    };

    Ok(TemplateCall {
        canonical_key: unescape_literal(&raw_key),
        call_expression,
        placeholders,
    })
}

/// Text outside the markers, and the expressions inside them
pub fn split_markers(text: &str, syntax: MarkerSyntax) -> (String, Vec<String>) {
    let markers = find_markers(text, syntax);
    let mut outside = String::new();
    let mut cursor = 0;
    for marker in &markers {
        outside.push_str(&text[cursor..marker.start]);
        cursor = marker.end;
    }
    outside.push_str(&text[cursor..]);
    (outside, markers.into_iter().map(|m| m.expression).collect())
}

fn placeholder_name(index: usize) -> String {
    ((b'a' + index as u8) as char).to_string()
}

fn find_markers(text: &str, syntax: MarkerSyntax) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut search = 0;
    let open = match syntax {
        MarkerSyntax::Dollar => "${",
        MarkerSyntax::Mustache => "{{",
    };

    while let Some(found) = text[search..].find(open) {
        let start = search + found;
        if syntax == MarkerSyntax::Dollar && crate::classify::is_escaped(text, start) {
            search = start + open.len();
            continue;
        }
        let inner_start = start + open.len();
        let close = match syntax {
            MarkerSyntax::Dollar => matching_brace(text, inner_start),
            MarkerSyntax::Mustache => text[inner_start..]
                .find("}}")
                .map(|i| (inner_start + i, inner_start + i + 2)),
        };
        let Some((inner_end, end)) = close else {
            break;
        };
        markers.push(Marker {
            start,
            end,
            expression: text[inner_start..inner_end].trim().to_string(),
        });
        search = end;
    }

    markers
}

/// Position of the `}` closing a `${`, and the byte after it
pub(crate) fn matching_brace(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in text[from..].char_indices() {
        let abs = from + offset;
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => in_string = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((abs, abs + 1));
                }
            }
            _ => {}
        }
    }

    None
}

/// Wrap raw literal text in `quote`, escaping bare occurrences of it and
/// turning real line breaks into `\n`. Existing escapes are kept as written.
pub fn quote_literal(raw: &str, quote: char) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push(quote);
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Resolve the simple escapes a key literal may contain
pub fn unescape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
