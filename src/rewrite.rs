//! Rewrite engine.
//!
//! Folds the candidate terms over a [`Buffer`], one splice per accepted term.
//! Each step locates and classifies against the buffer as mutated so far.

use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

use crate::classify::{self, Context, LookupSignatures};
use crate::error::Result;
use crate::normalize::normalize;
use crate::registry::KeyRegistry;
use crate::template::{self, MarkerSyntax};
use crate::terms::{self, CandidateTerm, LiteralOrigin, RawLiteral, ScanContext, TermKind};

/// A source buffer paired with its comment-blanked scan twin.
///
/// Both strings always have the same length; every splice is applied to both.
/// Positions are found in `scan`, but replacement text that carries over
/// existing markup is always copied from `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    source: String,
    scan: String,
    context: ScanContext,
}

impl Buffer {
    pub fn new(source: impl Into<String>, context: ScanContext) -> Self {
        let source = source.into();
        let scan = normalize(&source, context);
        Self {
            source,
            scan,
            context,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn scan(&self) -> &str {
        &self.scan
    }

    pub fn context(&self) -> ScanContext {
        self.context
    }

    pub fn into_source(self) -> String {
        self.source
    }

    /// True when no comment was blanked inside `range`
    fn is_uncommented(&self, range: Range<usize>) -> bool {
        self.source[range.clone()] == self.scan[range]
    }

    /// Replace `range` in both buffers
    pub fn splice(mut self, range: Range<usize>, replacement: &str) -> Self {
        self.source.replace_range(range.clone(), replacement);
        self.scan.replace_range(range, replacement);
        self
    }
}

/// What the engine needs besides the terms
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Lookup function emitted at call sites (`$t`, `this.$t`, `i18n.t`)
    pub method: &'a str,
    pub signatures: &'a LookupSignatures,
}

#[derive(Debug)]
pub struct RewriteOutcome {
    pub buffer: Buffer,
    /// Number of terms that produced a mutation
    pub replaced: usize,
}

/// A planned mutation and the key it registers
struct Splice {
    range: Range<usize>,
    replacement: String,
    key: String,
}

/// Apply `terms` to `buffer` in order.
///
/// Quoted kinds rewrite the first remaining eligible occurrence of their span.
/// Tag and element bodies are replaced at every markup text run showing the
/// same span, once per distinct span. A term whose span can no longer be
/// found is skipped and not counted.
pub fn rewrite(
    buffer: Buffer,
    terms: &[CandidateTerm],
    ctx: &RewriteContext<'_>,
    registry: &mut KeyRegistry,
) -> Result<RewriteOutcome> {
    let mut buffer = buffer;
    let mut replaced = 0;
    let mut bodies_done: HashSet<&str> = HashSet::new();

    for term in terms {
        if term.kind.is_quoted() {
            let Some(site) = first_eligible_occurrence(&buffer, term, ctx) else {
                debug!("span {} no longer present, skipped", term.original_span);
                continue;
            };
            let splice = plan_quoted(&buffer, term, site, ctx)?;
            buffer = buffer.splice(splice.range, &splice.replacement);
            registry.register(&splice.key, &splice.key);
            replaced += 1;
            continue;
        }

        if !bodies_done.insert(term.original_span.as_str()) {
            continue;
        }
        let call = template::convert(&term.content, ctx.method, MarkerSyntax::Mustache, '\'')?;
        let wrapped = format!("{{{{ {} }}}}", call.call_expression);

        let splices = if term.kind == TermKind::TaggedElementBody {
            plan_element_bodies(&buffer, term, &wrapped)
        } else {
            plan_tag_bodies(&buffer, term, &wrapped)
        };
        if splices.is_empty() {
            debug!("span {} no longer present, skipped", term.original_span);
            continue;
        }

        // Sites are in textual order; splicing back to front keeps them valid
        for (range, replacement) in splices.into_iter().rev() {
            buffer = buffer.splice(range, &replacement);
        }
        registry.register(&call.canonical_key, &call.canonical_key);
        replaced += 1;
    }

    Ok(RewriteOutcome { buffer, replaced })
}

/// First literal equal to the term's span that is neither localized nor in
/// a position rejected for script
fn first_eligible_occurrence(
    buffer: &Buffer,
    term: &CandidateTerm,
    ctx: &RewriteContext<'_>,
) -> Option<RawLiteral> {
    let scan = buffer.scan();
    terms::literal_sites(scan, buffer.context())
        .into_iter()
        .filter(|site| scan[site.range()] == term.original_span)
        .find(|site| {
            !ctx
                .signatures
                .is_already_localized(scan, &term.original_span, site.start)
                && !(buffer.context() == ScanContext::Script
                    && terms::rejected_in_script(scan, site.range()))
        })
}

/// Markup role of a quoted literal. The walker knows which literals are
/// plain attribute values; anything else it found sits in an expression.
fn markup_context(scan: &str, site: &RawLiteral) -> Context {
    match site.origin {
        LiteralOrigin::Attribute { name_start } => Context::PlainAttribute { name_start },
        LiteralOrigin::Expression => match classify::classify_markup(scan, site.start) {
            Context::PlainAttribute { .. } | Context::Body => Context::Interpolation,
            other => other,
        },
    }
}

fn plan_quoted(
    buffer: &Buffer,
    term: &CandidateTerm,
    site: RawLiteral,
    ctx: &RewriteContext<'_>,
) -> Result<Splice> {
    let span_range = site.range();

    let context = match buffer.context() {
        ScanContext::Script => None,
        ScanContext::Template => Some(markup_context(buffer.scan(), &site)),
    };

    let call_quote = match &context {
        Some(Context::PlainAttribute { .. }) => opposite_quote(site.quote),
        Some(Context::BoundAttribute { quote }) | Some(Context::BindingExpression { quote }) => {
            opposite_quote(*quote)
        }
        _ => '\'',
    };
    let (call, key) = call_for(term, ctx.method, call_quote)?;

    let splice = match context {
        Some(Context::PlainAttribute { name_start }) => {
            let source = buffer.source();
            let needs_space = source[..name_start]
                .chars()
                .next_back()
                .map_or(false, |c| !c.is_whitespace());
            let mut replacement = String::new();
            if needs_space {
                replacement.push(' ');
            }
            replacement.push(':');
            replacement.push_str(&source[name_start..site.start]);
            replacement.push(site.quote);
            replacement.push_str(&call);
            replacement.push(site.quote);
            Splice {
                range: name_start..span_range.end,
                replacement,
                key,
            }
        }
        _ => Splice {
            range: span_range,
            replacement: call,
            key,
        },
    };

    Ok(splice)
}

/// Call expression and registry key of a quoted term
fn call_for(term: &CandidateTerm, method: &str, quote: char) -> Result<(String, String)> {
    if term.kind == TermKind::Template {
        let call = template::convert(&term.content, method, MarkerSyntax::Dollar, quote)?;
        return Ok((call.call_expression, call.canonical_key));
    }
    let literal = template::quote_literal(&term.content, quote);
    Ok((
        format!("{}({})", method, literal),
        template::unescape_literal(&term.content),
    ))
}

/// Trimmed text of `run`, as a range
fn trimmed(scan: &str, run: Range<usize>) -> Range<usize> {
    let body = &scan[run.clone()];
    let lead = body.len() - body.trim_start().len();
    let start = run.start + lead;
    start..start + body.trim().len()
}

/// `>text<` sites: only the trimmed text is replaced, so surrounding
/// whitespace and comments stay as written
fn plan_tag_bodies(
    buffer: &Buffer,
    term: &CandidateTerm,
    wrapped: &str,
) -> Vec<(Range<usize>, String)> {
    let scan = buffer.scan();
    terms::text_runs(scan)
        .into_iter()
        .filter(|run| {
            terms::is_between_tags(scan, run) && scan[run.start - 1..run.end + 1] == term.original_span
        })
        .map(|run| trimmed(scan, run))
        .filter(|content| buffer.is_uncommented(content.clone()))
        .map(|content| (content, wrapped.to_string()))
        .collect()
}

/// `<tag attrs>text</tag>` sites. An element without comments is rebuilt
/// around the call; one with a comment inside keeps its markup and only has
/// its text replaced.
fn plan_element_bodies(
    buffer: &Buffer,
    term: &CandidateTerm,
    wrapped: &str,
) -> Vec<(Range<usize>, String)> {
    let scan = buffer.scan();
    let runs = terms::text_runs(scan);
    let tag = term.tag_name.as_deref().unwrap_or_default();
    let attributes = term.tag_attributes.as_deref().unwrap_or_default();

    terms::element_sites(scan, &runs)
        .into_iter()
        .filter(|site| scan[site.whole.clone()] == term.original_span)
        .filter_map(|site| {
            // Source and scan agree here, so the term's tag text is the source's
            if buffer.is_uncommented(site.whole.clone()) {
                let replacement = format!("<{}{}>{}</{}>", tag, attributes, wrapped, tag);
                return Some((site.whole, replacement));
            }
            let content = trimmed(scan, site.body);
            buffer
                .is_uncommented(content.clone())
                .then(|| (content, wrapped.to_string()))
        })
        .collect()
}

fn opposite_quote(quote: char) -> char {
    if quote == '\'' {
        '"'
    } else {
        '\''
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::TermExtractor;
    use pretty_assertions::assert_eq;

    fn signatures() -> LookupSignatures {
        LookupSignatures::new(&["$t".to_string(), "this.$t".to_string()])
    }

    fn run(source: &str, context: ScanContext, method: &str) -> (String, KeyRegistry, usize) {
        let sigs = signatures();
        let extractor = TermExtractor::new(sigs.clone(), &["el-button".to_string()]);
        let buffer = Buffer::new(source, context);
        let terms = extractor.extract(buffer.scan(), context);
        let ctx = RewriteContext {
            method,
            signatures: &sigs,
        };
        let mut registry = KeyRegistry::new();
        let outcome = rewrite(buffer, &terms, &ctx, &mut registry).unwrap();
        (outcome.buffer.into_source(), registry, outcome.replaced)
    }

    #[test]
    fn test_buffer_splice_keeps_twins_aligned() {
        let buffer = Buffer::new("a('保存') // 注释", ScanContext::Script);
        let buffer = buffer.splice(2..10, "$t('保存')");
        assert_eq!(buffer.source(), "a($t('保存')) // 注释");
        assert_eq!(buffer.source().len(), buffer.scan().len());
        assert!(!buffer.scan().contains("注释"));
    }

    #[test]
    fn test_plain_attribute_gets_bound() {
        let (out, registry, replaced) = run(
            r#"<el-input placeholder="请输入"></el-input>"#,
            ScanContext::Template,
            "$t",
        );
        assert_eq!(out, r#"<el-input :placeholder="$t('请输入')"></el-input>"#);
        assert_eq!(replaced, 1);
        assert_eq!(registry.get("请输入"), Some("请输入"));
    }

    #[test]
    fn test_single_quoted_attribute_uses_double_quoted_call() {
        let (out, _, _) = run("<a title='提示'>x</a>", ScanContext::Template, "$t");
        assert_eq!(out, r#"<a :title='$t("提示")'>x</a>"#);
    }

    #[test]
    fn test_attribute_glued_to_previous_value_gets_space() {
        let (out, _, _) = run(r#"<a id="x"title="提示">x</a>"#, ScanContext::Template, "$t");
        assert_eq!(out, r#"<a id="x" :title="$t('提示')">x</a>"#);
    }

    #[test]
    fn test_bound_attribute_spliced_directly() {
        let (out, _, _) = run(
            r#"<el-input :placeholder="'请输入'" />"#,
            ScanContext::Template,
            "$t",
        );
        assert_eq!(out, r#"<el-input :placeholder="$t('请输入')" />"#);
    }

    #[test]
    fn test_tag_body_wrapped_and_whitespace_kept() {
        let (out, _, _) = run("<span>\n  查询\n</span>", ScanContext::Template, "$t");
        assert_eq!(out, "<span>\n  {{ $t('查询') }}\n</span>");
    }

    #[test]
    fn test_templated_tag_body() {
        let (out, registry, _) = run("<p>共{{ total }}条</p>", ScanContext::Template, "$t");
        assert_eq!(out, "<p>{{ $t('共{a}条', { a: total }) }}</p>");
        assert!(registry.contains("共{a}条"));
    }

    #[test]
    fn test_element_body_rebuilt() {
        let (out, _, replaced) = run(
            r#"<el-button type="primary">查询</el-button>"#,
            ScanContext::Template,
            "$t",
        );
        assert_eq!(out, r#"<el-button type="primary">{{ $t('查询') }}</el-button>"#);
        assert_eq!(replaced, 1);
    }

    #[test]
    fn test_same_text_in_three_contexts() {
        let source = r#"<div title="保存"><span>保存</span><b :title="'保存'">x</b></div>"#;
        let (out, registry, replaced) = run(source, ScanContext::Template, "$t");
        assert_eq!(
            out,
            r#"<div :title="$t('保存')"><span>{{ $t('保存') }}</span><b :title="$t('保存')">x</b></div>"#
        );
        assert_eq!(replaced, 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_script_template_literal() {
        let (out, registry, _) = run(
            "const msg = `共${count}条记录`;",
            ScanContext::Script,
            "this.$t",
        );
        assert_eq!(out, "const msg = this.$t('共{a}条记录', { a: count });");
        assert_eq!(registry.get("共{a}条记录"), Some("共{a}条记录"));
    }

    #[test]
    fn test_duplicate_script_literals_each_rewritten() {
        let (out, registry, replaced) =
            run("a('保存');\nb('保存');", ScanContext::Script, "this.$t");
        assert_eq!(out, "a(this.$t('保存'));\nb(this.$t('保存'));");
        assert_eq!(replaced, 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_comment_text_untouched() {
        let source = "// 保存\nconst a = '保存';";
        let (out, _, _) = run(source, ScanContext::Script, "this.$t");
        assert_eq!(out, "// 保存\nconst a = this.$t('保存');");
    }

    #[test]
    fn test_comment_in_tag_body_kept() {
        let (out, registry, _) = run(
            "<span>保存 <!-- 按钮文案 --></span>",
            ScanContext::Template,
            "$t",
        );
        assert_eq!(out, "<span>{{ $t('保存') }} <!-- 按钮文案 --></span>");
        assert_eq!(registry.get("保存"), Some("保存"));
    }

    #[test]
    fn test_comment_in_element_body_kept() {
        let (out, _, replaced) = run(
            r#"<el-button type="primary">保存<!-- todo --></el-button>"#,
            ScanContext::Template,
            "$t",
        );
        assert_eq!(
            out,
            r#"<el-button type="primary">{{ $t('保存') }}<!-- todo --></el-button>"#
        );
        assert_eq!(replaced, 1);
    }

    #[test]
    fn test_slashes_in_markup_text_are_prose() {
        let (out, _, _) = run(
            "<p>日期 2024 // 备注</p>\n<span>保存</span>",
            ScanContext::Template,
            "$t",
        );
        assert_eq!(
            out,
            "<p>{{ $t('日期 2024 // 备注') }}</p>\n<span>{{ $t('保存') }}</span>"
        );
    }

    #[test]
    fn test_markup_inside_string_is_not_a_body() {
        let (out, registry, _) = run(
            r#"<div v-html="'<b>保存</b>'"></div><span>保存</span>"#,
            ScanContext::Template,
            "$t",
        );
        assert_eq!(
            out,
            r#"<div v-html="$t('<b>保存</b>')"></div><span>{{ $t('保存') }}</span>"#
        );
        assert!(registry.contains("<b>保存</b>"));
        assert!(registry.contains("保存"));
    }

    #[test]
    fn test_namespaced_attribute_gets_bound() {
        let (out, _, _) = run(r#"<use xlink:title="图标"/>"#, ScanContext::Template, "$t");
        assert_eq!(out, r#"<use :xlink:title="$t('图标')"/>"#);
    }

    #[test]
    fn test_object_keys_and_literal_types_untouched() {
        let source = "const map = { '名称': 1 };\ntype S = '启用' | '禁用';\nconst a = '名称';";
        let (out, registry, replaced) = run(source, ScanContext::Script, "this.$t");
        assert_eq!(
            out,
            "const map = { '名称': 1 };\ntype S = '启用' | '禁用';\nconst a = this.$t('名称');"
        );
        assert_eq!(replaced, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let source = r#"<el-input placeholder="请输入"></el-input><el-button>查询</el-button>"#;
        let (once, _, _) = run(source, ScanContext::Template, "$t");
        let (twice, registry, replaced) = run(&once, ScanContext::Template, "$t");
        assert_eq!(once, twice);
        assert_eq!(replaced, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_placeholder_overflow_fails() {
        let text: String = (0..27).map(|i| format!("项${{v{}}}", i)).collect();
        let source = format!("const a = `{}`;", text);
        let sigs = signatures();
        let extractor = TermExtractor::new(sigs.clone(), &[]);
        let buffer = Buffer::new(source, ScanContext::Script);
        let terms = extractor.extract(buffer.scan(), ScanContext::Script);
        let ctx = RewriteContext {
            method: "$t",
            signatures: &sigs,
        };
        let mut registry = KeyRegistry::new();
        assert!(rewrite(buffer, &terms, &ctx, &mut registry).is_err());
    }
}
