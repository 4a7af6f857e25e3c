//! Term extraction.
//!
//! Walks a normalized buffer and returns every natural-language literal that
//! survives the classifiers. Markup is walked with an explicit cursor so that
//! quoted literals are only taken from attribute values and `{{ }}`
//! expressions; quote characters in body text are prose.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use crate::classify::{self, LookupSignatures};
use crate::template::{self, MarkerSyntax};

/// Shape of a candidate term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    DoubleQuote,
    SingleQuote,
    Template,
    TagBody,
    TaggedElementBody,
    FieldAssignment,
}

impl TermKind {
    /// Quoted kinds are rewritten occurrence by occurrence
    pub fn is_quoted(self) -> bool {
        matches!(
            self,
            TermKind::DoubleQuote
                | TermKind::SingleQuote
                | TermKind::Template
                | TermKind::FieldAssignment
        )
    }
}

/// Which dialect a buffer is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanContext {
    /// Component markup (`<template>` section)
    Template,
    /// Script (`<script>` section, `.ts`, `.js`)
    Script,
}

/// A localizable literal found in a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTerm {
    /// Exact text that will be replaced, delimiters included
    pub original_span: String,
    /// Trimmed inner text
    pub content: String,
    pub kind: TermKind,
    /// Byte offset of `original_span` in the scanned buffer
    pub offset: usize,
    /// Delimiter of quoted kinds
    pub quote: Option<char>,
    /// Element name (tagged element bodies only)
    pub tag_name: Option<String>,
    /// Raw attribute text, leading whitespace included (tagged element bodies only)
    pub tag_attributes: Option<String>,
}

impl CandidateTerm {
    fn quoted(span: &str, content: &str, kind: TermKind, offset: usize, quote: char) -> Self {
        Self {
            original_span: span.to_string(),
            content: content.to_string(),
            kind,
            offset,
            quote: Some(quote),
            tag_name: None,
            tag_attributes: None,
        }
    }
}

/// Where the tokenizers found a quoted literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LiteralOrigin {
    /// Value of a plain markup attribute whose name starts at `name_start`
    Attribute { name_start: usize },
    /// Inside script, a `{{ }}` expression or a bound attribute value
    Expression,
}

/// A quoted literal located by the tokenizers
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawLiteral {
    pub start: usize,
    pub end: usize,
    pub quote: char,
    pub origin: LiteralOrigin,
}

impl RawLiteral {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A configured text element whose body is a markup text run
#[derive(Debug, Clone)]
pub(crate) struct ElementSite {
    pub whole: Range<usize>,
    pub name: Range<usize>,
    pub attributes: Range<usize>,
    pub body: Range<usize>,
}

static ELEMENT_BODY_REGEX: OnceLock<Regex> = OnceLock::new();
static FIELD_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// `<tag attrs>plain text</tag>`; the closing name is compared by hand
fn get_element_body_regex() -> &'static Regex {
    ELEMENT_BODY_REGEX.get_or_init(|| {
        Regex::new(r"<([A-Za-z][A-Za-z0-9\-]*)(\s[^<>]*)?>([^<>{}]*)</([A-Za-z][A-Za-z0-9\-]*)\s*>")
            .expect("ELEMENT_BODY_REGEX pattern is invalid - this is a bug")
    })
}

/// `name:` right before a literal
fn get_field_name_regex() -> &'static Regex {
    FIELD_NAME_REGEX.get_or_init(|| {
        Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*\s*:\s*$")
            .expect("FIELD_NAME_REGEX pattern is invalid - this is a bug")
    })
}

/// Scans buffers with a fixed set of lookup signatures and text elements
#[derive(Debug, Clone)]
pub struct TermExtractor {
    signatures: LookupSignatures,
    text_elements: Vec<String>,
}

impl TermExtractor {
    pub fn new(signatures: LookupSignatures, text_elements: &[String]) -> Self {
        Self {
            signatures,
            text_elements: text_elements.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn signatures(&self) -> &LookupSignatures {
        &self.signatures
    }

    /// Candidate terms of a normalized buffer.
    ///
    /// Quoted literals come first in textual order, then tag bodies, then
    /// specific element bodies. Identical spans may repeat; the rewrite engine
    /// deduplicates by span.
    pub fn extract(&self, text: &str, context: ScanContext) -> Vec<CandidateTerm> {
        let mut terms = Vec::new();

        match context {
            ScanContext::Script => {
                let mut literals = Vec::new();
                scan_script_literals(text, 0..text.len(), &mut literals);
                for literal in literals {
                    if let Some(term) = self.accept_literal(text, literal, context) {
                        terms.push(term);
                    }
                }
            }
            ScanContext::Template => {
                let walk = walk_markup(text);
                for literal in walk.literals {
                    if let Some(term) = self.accept_literal(text, literal, context) {
                        terms.push(term);
                    }
                }

                let elements = self.scan_element_bodies(text, &walk.text_runs);
                for run in walk.text_runs {
                    if elements
                        .iter()
                        .any(|e| e.offset <= run.start && run.end <= e.offset + e.original_span.len())
                    {
                        continue;
                    }
                    if let Some(term) = self.accept_tag_body(text, run) {
                        terms.push(term);
                    }
                }
                terms.extend(elements);
            }
        }

        terms
    }

    /// Apply the rejection predicates to a quoted literal
    fn accept_literal(
        &self,
        text: &str,
        literal: RawLiteral,
        context: ScanContext,
    ) -> Option<CandidateTerm> {
        let span = &text[literal.start..literal.end];
        let inner = &span[1..span.len() - 1];
        let content = inner.trim();

        let prose = if literal.quote == '`' {
            let (outside, _) = template::split_markers(content, MarkerSyntax::Dollar);
            outside
        } else {
            content.to_string()
        };
        if !classify::contains_target_script(&prose) {
            return None;
        }

        if is_wrapped_in_other_quote(content, literal.quote) {
            return None;
        }
        if classify::is_code_like(&prose) {
            return None;
        }
        if classify::is_file_path_like(content) {
            return None;
        }
        if self
            .signatures
            .is_already_localized(text, span, literal.start)
        {
            return None;
        }
        if context == ScanContext::Script && rejected_in_script(text, literal.range()) {
            return None;
        }

        let kind = match literal.quote {
            '`' => TermKind::Template,
            _ if context == ScanContext::Script
                && get_field_name_regex().is_match(&text[..literal.start]) =>
            {
                TermKind::FieldAssignment
            }
            '"' => TermKind::DoubleQuote,
            _ => TermKind::SingleQuote,
        };

        Some(CandidateTerm::quoted(
            span,
            content,
            kind,
            literal.start,
            literal.quote,
        ))
    }

    /// `>text<` between two tags
    fn accept_tag_body(&self, text: &str, run: Range<usize>) -> Option<CandidateTerm> {
        if !is_between_tags(text, &run) {
            return None;
        }

        let body = &text[run.clone()];
        let content = body.trim();
        let (outside, expressions) = template::split_markers(content, MarkerSyntax::Mustache);
        if !classify::contains_target_script(&outside) {
            return None;
        }
        if expressions
            .iter()
            .any(|expr| classify::contains_target_script(expr))
        {
            return None;
        }
        if outside.contains("{{") || outside.contains("}}") {
            return None;
        }
        if classify::is_code_like(&outside) {
            return None;
        }

        let span = &text[run.start - 1..run.end + 1];
        if self.signatures.is_already_localized(text, span, run.start - 1) {
            return None;
        }

        Some(CandidateTerm {
            original_span: span.to_string(),
            content: content.to_string(),
            kind: TermKind::TagBody,
            offset: run.start - 1,
            quote: None,
            tag_name: None,
            tag_attributes: None,
        })
    }

    /// Whole `<el-button …>text</el-button>` elements for configured names
    fn scan_element_bodies(&self, text: &str, runs: &[Range<usize>]) -> Vec<CandidateTerm> {
        let mut terms = Vec::new();

        for site in element_sites(text, runs) {
            let name = text[site.name.clone()].to_lowercase();
            if !self.text_elements.contains(&name) {
                continue;
            }

            let attributes = &text[site.attributes.clone()];
            let content = text[site.body.clone()].trim();
            if classify::contains_target_script(attributes)
                || !classify::contains_target_script(content)
                || classify::is_code_like(content)
            {
                continue;
            }

            terms.push(CandidateTerm {
                original_span: text[site.whole.clone()].to_string(),
                content: content.to_string(),
                kind: TermKind::TaggedElementBody,
                offset: site.whole.start,
                quote: None,
                tag_name: Some(text[site.name].to_string()),
                tag_attributes: Some(attributes.to_string()),
            });
        }

        terms
    }
}

/// `run` sits directly between a `>` and a `<`
pub(crate) fn is_between_tags(text: &str, run: &Range<usize>) -> bool {
    let bytes = text.as_bytes();
    run.start > 0
        && run.end < bytes.len()
        && bytes[run.start - 1] == b'>'
        && bytes[run.end] == b'<'
}

/// Markup text runs of `text`, mustaches included
pub(crate) fn text_runs(text: &str) -> Vec<Range<usize>> {
    walk_markup(text).text_runs
}

/// `<tag attrs>body</tag>` elements whose body is one of `runs`.
///
/// Matches inside attribute values are not text runs and are dropped.
pub(crate) fn element_sites(text: &str, runs: &[Range<usize>]) -> Vec<ElementSite> {
    let mut sites = Vec::new();

    for caps in get_element_body_regex().captures_iter(text) {
        let (Some(whole), Some(open), Some(body), Some(close)) =
            (caps.get(0), caps.get(1), caps.get(3), caps.get(4))
        else {
            continue;
        };
        if !open.as_str().eq_ignore_ascii_case(close.as_str()) {
            continue;
        }
        if !runs.iter().any(|run| *run == body.range()) {
            continue;
        }
        let attributes = caps
            .get(2)
            .map(|m| m.range())
            .unwrap_or(open.end()..open.end());
        // A `>` inside an attribute value cuts the match short
        let attribute_text = &text[attributes.clone()];
        if attribute_text.matches('"').count() % 2 == 1
            || attribute_text.matches('\'').count() % 2 == 1
        {
            continue;
        }

        sites.push(ElementSite {
            whole: whole.range(),
            name: open.range(),
            attributes,
            body: body.range(),
        });
    }

    sites
}

/// Script positions where a call expression is not allowed or not wanted:
/// property declaration blocks, object keys and literal types
pub(crate) fn rejected_in_script(text: &str, range: Range<usize>) -> bool {
    classify::in_declaration_block(text, range.start)
        || classify::is_object_key(text, range.clone())
        || classify::is_type_literal(text, range)
}

/// Every quoted literal the scanner for `context` would visit
pub(crate) fn literal_sites(text: &str, context: ScanContext) -> Vec<RawLiteral> {
    match context {
        ScanContext::Script => {
            let mut literals = Vec::new();
            scan_script_literals(text, 0..text.len(), &mut literals);
            literals
        }
        ScanContext::Template => walk_markup(text).literals,
    }
}

/// `"'…'"` or `'"…"'`: the inner literal is the real candidate
fn is_wrapped_in_other_quote(content: &str, quote: char) -> bool {
    let other = match quote {
        '"' => '\'',
        '\'' => '"',
        _ => return false,
    };
    content.len() >= 2 && content.starts_with(other) && content.ends_with(other)
}

/// Result of walking markup
#[derive(Debug, Default)]
struct MarkupWalk {
    literals: Vec<RawLiteral>,
    /// Text between a tag end and the next tag start, mustaches included
    text_runs: Vec<Range<usize>>,
}

fn walk_markup(text: &str) -> MarkupWalk {
    let bytes = text.as_bytes();
    let mut walk = MarkupWalk::default();
    let mut i = 0;
    let mut run_start = 0;

    while i < bytes.len() {
        if text[i..].starts_with("{{") {
            let inner = i + 2;
            let close = text[inner..].find("}}").map(|c| inner + c);
            let end = close.unwrap_or(text.len());
            scan_script_literals(text, inner..end, &mut walk.literals);
            i = close.map(|c| c + 2).unwrap_or(text.len());
            continue;
        }

        if bytes[i] == b'<' && i + 1 < bytes.len() {
            let next = bytes[i + 1];
            if next.is_ascii_alphabetic() || next == b'/' || next == b'!' {
                if i > run_start {
                    walk.text_runs.push(run_start..i);
                }
                i = if next.is_ascii_alphabetic() {
                    scan_tag(text, i, &mut walk.literals)
                } else {
                    text[i..].find('>').map(|c| i + c + 1).unwrap_or(text.len())
                };
                run_start = i;
                continue;
            }
        }

        i += utf8_len(bytes[i]);
    }

    if run_start < text.len() {
        walk.text_runs.push(run_start..text.len());
    }

    walk
}

/// Walk one opening tag from its `<`; returns the index after its `>`
fn scan_tag(text: &str, start: usize, literals: &mut Vec<RawLiteral>) -> usize {
    let bytes = text.as_bytes();
    let mut i = start + 1;

    while i < bytes.len() && !is_tag_delimiter(bytes[i]) {
        i += 1;
    }

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return bytes.len();
        }
        if bytes[i] == b'>' {
            return i + 1;
        }
        if bytes[i] == b'/' {
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && !is_tag_delimiter(bytes[i]) && bytes[i] != b'=' {
            i += utf8_len(bytes[i]);
        }
        let name = &text[name_start..i];

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return bytes.len();
        }

        let quote = bytes[i];
        if quote != b'"' && quote != b'\'' {
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                i += 1;
            }
            continue;
        }

        let value_start = i;
        let mut j = i + 1;
        while j < bytes.len() && (bytes[j] != quote || classify::is_escaped(text, j)) {
            j += 1;
        }
        let value_end = j.min(bytes.len());

        if is_bound_name(name) {
            scan_script_literals(text, value_start + 1..value_end, literals);
        } else if value_end < bytes.len() {
            literals.push(RawLiteral {
                start: value_start,
                end: value_end + 1,
                quote: quote as char,
                origin: LiteralOrigin::Attribute { name_start },
            });
        }

        i = (value_end + 1).min(bytes.len());
    }
}

fn is_tag_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

fn is_bound_name(name: &str) -> bool {
    name.starts_with(':') || name.starts_with('@') || name.starts_with('#') || name.starts_with("v-")
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => 1,
    }
}

/// String literals of a script range. Single/double literals end at the line;
/// backtick literals may span lines and nest `${ }`.
fn scan_script_literals(text: &str, range: Range<usize>, out: &mut Vec<RawLiteral>) {
    let bytes = text.as_bytes();
    let end = range.end.min(bytes.len());
    let mut i = range.start;

    while i < end {
        let b = bytes[i];
        if b != b'\'' && b != b'"' && b != b'`' {
            i += utf8_len(b);
            continue;
        }

        let quote = b;
        let mut j = i + 1;
        let mut closed = false;
        while j < end {
            let c = bytes[j];
            if c == b'\\' {
                j += 2;
                continue;
            }
            if c == quote {
                closed = true;
                break;
            }
            if c == b'\n' && quote != b'`' {
                break;
            }
            if quote == b'`' && c == b'$' && j + 1 < end && bytes[j + 1] == b'{' {
                match template::matching_brace(&text[..end], j + 2) {
                    Some((_, after)) => {
                        j = after;
                        continue;
                    }
                    None => break,
                }
            }
            j += utf8_len(c);
        }

        if closed {
            out.push(RawLiteral {
                start: i,
                end: j + 1,
                quote: quote as char,
                origin: LiteralOrigin::Expression,
            });
            i = j + 1;
        } else {
            i += 1;
        }
    }
}
