//! Context classifiers.
//!
//! Each classifier answers one question about a position in a (normalized)
//! buffer without parsing it. None of them fail: "no match" is `false`/`None`.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Bytes inspected before a literal when looking for an enclosing lookup call
pub const LOCALIZED_WINDOW: usize = 100;

/// Syntactic role of a literal found in markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// `name="…"`: the attribute must become `:name="call"`
    PlainAttribute { name_start: usize },
    /// Inside the value of `:name="…"` / `v-bind:name="…"`
    BoundAttribute { quote: char },
    /// Inside `{{ … }}`
    Interpolation,
    /// Inside the value of an event or directive (`@click="…"`, `v-if="…"`)
    BindingExpression { quote: char },
    /// Plain tag-body text
    Body,
}

// =============================================================================
// Static regex patterns (compiled once via OnceLock for thread-safe lazy init)
// =============================================================================

static TARGET_SCRIPT_REGEX: OnceLock<Regex> = OnceLock::new();
static PLAIN_ATTRIBUTE_REGEX: OnceLock<Regex> = OnceLock::new();
static BINDING_OPEN_REGEX: OnceLock<Regex> = OnceLock::new();
static BENIGN_LABEL_REGEX: OnceLock<Regex> = OnceLock::new();
static CODE_SIGNATURE_REGEX: OnceLock<Regex> = OnceLock::new();
static PATH_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();
static FILE_EXTENSION_REGEX: OnceLock<Regex> = OnceLock::new();
static DECLARATION_OPEN_REGEX: OnceLock<Regex> = OnceLock::new();
static TYPE_ALIAS_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_target_script_regex() -> &'static Regex {
    TARGET_SCRIPT_REGEX.get_or_init(|| {
        Regex::new(r"\p{Han}").expect("TARGET_SCRIPT_REGEX pattern is invalid - this is a bug")
    })
}

/// `name=` (optionally spaced) right at the end of the inspected prefix.
/// Namespaced names such as `xlink:title` are plain attributes too.
fn get_plain_attribute_regex() -> &'static Regex {
    PLAIN_ATTRIBUTE_REGEX.get_or_init(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_\-.:]*)\s*=\s*$")
            .expect("PLAIN_ATTRIBUTE_REGEX pattern is invalid - this is a bug")
    })
}

/// Opening of a bound or directive attribute value, capturing name and quote
fn get_binding_open_regex() -> &'static Regex {
    BINDING_OPEN_REGEX.get_or_init(|| {
        Regex::new(r#"(?:^|[\s"'])((?:v-[A-Za-z0-9_\-]+(?::[A-Za-z0-9_\-\[\]]+)?|[:@#][A-Za-z0-9_\-\[\].]*))\s*=\s*(["'])"#)
            .expect("BINDING_OPEN_REGEX pattern is invalid - this is a bug")
    })
}

/// Letters, digits, spaces, parentheses and unit symbols only
fn get_benign_label_regex() -> &'static Regex {
    BENIGN_LABEL_REGEX.get_or_init(|| {
        Regex::new(r"^[\p{Han}\p{L}\p{N}\s()（）°℃℉%‰²³μΩ/]+$")
            .expect("BENIGN_LABEL_REGEX pattern is invalid - this is a bug")
    })
}

fn get_code_signature_regex() -> &'static Regex {
    CODE_SIGNATURE_REGEX.get_or_init(|| {
        Regex::new(concat!(
            r"(?:^\s*(?:function|return|const|let|var|import|export|await)\b)",
            r"|(?:=>)",
            r"|(?:[A-Za-z_$][A-Za-z0-9_$.]*\s*\([^)]*\))",
            r"|(?:\bthis\.[A-Za-z_$])",
            r"|(?:[A-Za-z_$][A-Za-z0-9_$]*\s*(?:\+|-)?=[^=])",
            r"|(?:;\s*$)",
        ))
        .expect("CODE_SIGNATURE_REGEX pattern is invalid - this is a bug")
    })
}

fn get_path_prefix_regex() -> &'static Regex {
    PATH_PREFIX_REGEX.get_or_init(|| {
        Regex::new(r"^(?:\.{1,2}/|/|@/|~/|[A-Za-z]:[\\/]|https?://)")
            .expect("PATH_PREFIX_REGEX pattern is invalid - this is a bug")
    })
}

fn get_file_extension_regex() -> &'static Regex {
    FILE_EXTENSION_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\.(?:png|jpe?g|gif|svg|webp|ico|bmp|css|scss|sass|less|jsx?|tsx?|vue|json|html?|woff2?|ttf|eot|mp3|mp4|wav|pdf|xlsx?|docx?|zip|txt|csv)$")
            .expect("FILE_EXTENSION_REGEX pattern is invalid - this is a bug")
    })
}

/// Blocks whose literals are evaluated without a component instance
fn get_declaration_open_regex() -> &'static Regex {
    DECLARATION_OPEN_REGEX.get_or_init(|| {
        Regex::new(r"\bprops\s*:\s*\{|\bdefineProps\s*(?:<[^>]*>)?\s*\(|\bwithDefaults\s*\(")
            .expect("DECLARATION_OPEN_REGEX pattern is invalid - this is a bug")
    })
}

/// `type Name<…> =` (optionally followed by a leading `|`) at the end of a prefix
fn get_type_alias_regex() -> &'static Regex {
    TYPE_ALIAS_REGEX.get_or_init(|| {
        Regex::new(r"\btype\s+[A-Za-z_$][A-Za-z0-9_$]*\s*(?:<[^>]*>)?\s*=\s*\|?\s*$")
            .expect("TYPE_ALIAS_REGEX pattern is invalid - this is a bug")
    })
}

/// True when `text` holds at least one Han character
pub fn contains_target_script(text: &str) -> bool {
    get_target_script_regex().is_match(text)
}

/// Largest char boundary `<= index`
pub(crate) fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'.'
}

/// True when the byte at `pos` is preceded by an odd run of backslashes
pub(crate) fn is_escaped(text: &str, pos: usize) -> bool {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut i = pos;
    while i > 0 && bytes[i - 1] == b'\\' {
        count += 1;
        i -= 1;
    }
    count % 2 == 1
}

/// Recognized lookup-call signatures (`$t(`, `this.$t(`, `i18n.t(` …)
#[derive(Debug, Clone)]
pub struct LookupSignatures {
    methods: Vec<String>,
}

impl LookupSignatures {
    pub fn new(methods: &[String]) -> Self {
        let mut methods: Vec<String> = methods
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        methods.sort();
        methods.dedup();
        // Longest first so `this.$t` is tried before `$t`
        methods.sort_by_key(|m| std::cmp::Reverse(m.len()));
        Self { methods }
    }

    /// Already localized: the span itself carries a lookup call, or the
    /// literal at `offset` is the first argument of one.
    pub fn is_already_localized(&self, scan: &str, span: &str, offset: usize) -> bool {
        if self.contains_call(span) {
            return true;
        }
        let offset = floor_boundary(scan, offset);
        let start = floor_boundary(scan, offset.saturating_sub(LOCALIZED_WINDOW));
        self.window_ends_with_call(&scan[start..offset])
    }

    /// `window` ends with `method (` followed only by whitespace
    fn window_ends_with_call(&self, window: &str) -> bool {
        let trimmed = window.trim_end();
        let Some(before_paren) = trimmed.strip_suffix('(') else {
            return false;
        };
        let before_paren = before_paren.trim_end();
        self.methods.iter().any(|method| {
            before_paren.ends_with(method.as_str()) && {
                let start = before_paren.len() - method.len();
                start == 0 || !is_ident_byte(before_paren.as_bytes()[start - 1])
            }
        })
    }

    fn contains_call(&self, text: &str) -> bool {
        self.methods.iter().any(|method| {
            text.match_indices(method.as_str()).any(|(pos, _)| {
                let boundary_ok = pos == 0 || !is_ident_byte(text.as_bytes()[pos - 1]);
                let after = text[pos + method.len()..].trim_start();
                boundary_ok && after.starts_with('(')
            })
        })
    }
}

/// Classify the markup literal starting at `offset`.
///
/// Precedence: plain attribute, bound attribute, interpolation, binding
/// expression, body.
pub fn classify_markup(scan: &str, offset: usize) -> Context {
    let prefix = &scan[..floor_boundary(scan, offset)];
    let binding = open_binding_value(prefix);

    if binding.is_none() && !in_interpolation(prefix) {
        if let Some(ctx) = plain_attribute(prefix) {
            return ctx;
        }
    }

    if let Some((name, quote)) = &binding {
        if name.starts_with(':') || name.starts_with("v-bind") {
            return Context::BoundAttribute { quote: *quote };
        }
    }

    if in_interpolation(prefix) {
        return Context::Interpolation;
    }

    if let Some((_, quote)) = binding {
        return Context::BindingExpression { quote };
    }

    Context::Body
}

/// `name=` immediately before the literal, for a name that is not bound
fn plain_attribute(prefix: &str) -> Option<Context> {
    let caps = get_plain_attribute_regex().captures(prefix)?;
    let name = caps.get(1)?;
    let name_start = name.start();
    // The name must start right after whitespace, a quote or the tag name
    if name_start > 0 {
        let before = prefix[..name_start].chars().next_back()?;
        if !(before.is_whitespace() || before == '"' || before == '\'') {
            return None;
        }
    }
    if !inside_tag(&prefix[..name_start]) {
        return None;
    }
    Some(Context::PlainAttribute { name_start })
}

/// The last `<` opens a tag that has not been closed by `>`
fn inside_tag(prefix: &str) -> bool {
    match (prefix.rfind('<'), prefix.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

/// True when an unmatched `{{` precedes the end of `prefix`
pub fn in_interpolation(prefix: &str) -> bool {
    match prefix.rfind("{{") {
        Some(open) => !prefix[open + 2..].contains("}}"),
        None => false,
    }
}

/// Nearest bound/directive attribute whose quoted value is still open at the
/// end of `prefix`. Returns its name and quote character.
pub fn open_binding_value(prefix: &str) -> Option<(String, char)> {
    let caps = get_binding_open_regex().captures_iter(prefix).last()?;
    let name = caps.get(1)?.as_str().to_string();
    let quote_match = caps.get(2)?;
    let quote = quote_match.as_str().chars().next()?;

    // Count the opening quote plus every unescaped repeat of it; odd means open
    let mut count = 0usize;
    for (i, ch) in prefix[quote_match.start()..].char_indices() {
        if ch == quote && !is_escaped(prefix, quote_match.start() + i) {
            count += 1;
        }
    }

    if count % 2 == 1 {
        Some((name, quote))
    } else {
        None
    }
}

/// Code-syntax signatures, with unit-annotated labels exempted first
pub fn is_code_like(content: &str) -> bool {
    let content = content.trim();
    if get_benign_label_regex().is_match(content) {
        return false;
    }
    get_code_signature_regex().is_match(content)
}

/// Path prefixes or a trailing non-text file extension
pub fn is_file_path_like(content: &str) -> bool {
    let content = content.trim();
    if content.chars().any(char::is_whitespace) {
        return false;
    }
    get_path_prefix_regex().is_match(content) || get_file_extension_regex().is_match(content)
}

/// Inside an open `props: {…}`, `defineProps(…)` or `withDefaults(…)` block
pub fn in_declaration_block(scan: &str, offset: usize) -> bool {
    let offset = floor_boundary(scan, offset);
    get_declaration_open_regex()
        .find_iter(&scan[..offset])
        .any(|m| {
            let (open, close) = if m.as_str().ends_with('{') {
                ('{', '}')
            } else {
                ('(', ')')
            };
            bracket_still_open(&scan[m.end()..offset], open, close)
        })
}

/// Last non-whitespace char before `pos` and its offset
fn char_before(scan: &str, pos: usize) -> Option<(usize, char)> {
    scan[..floor_boundary(scan, pos)]
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
}

/// First non-whitespace char at or after `pos` and its offset
fn char_after(scan: &str, pos: usize) -> Option<(usize, char)> {
    let pos = floor_boundary(scan, pos);
    scan[pos..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, c)| (pos + i, c))
}

/// A literal used as a property name: `{ '名称': 1 }`, `{ a: 1, '名称': 2 }`
pub fn is_object_key(scan: &str, literal: Range<usize>) -> bool {
    matches!(char_before(scan, literal.start), Some((_, '{' | ',')))
        && matches!(char_after(scan, literal.end), Some((_, ':')))
}

/// A literal in type position: the right side of `type X =` or a member of
/// a `|` union. `||` is a logical operator, not a union.
pub fn is_type_literal(scan: &str, literal: Range<usize>) -> bool {
    let prefix = &scan[..floor_boundary(scan, literal.start)];
    if get_type_alias_regex().is_match(prefix) {
        return true;
    }

    let union_before = match char_before(scan, literal.start) {
        Some((at, '|')) => !scan[..at].ends_with('|'),
        _ => false,
    };
    let union_after = match char_after(scan, literal.end) {
        Some((at, '|')) => !scan[at + 1..].starts_with('|'),
        _ => false,
    };
    union_before || union_after
}

/// Depth after walking `text` starting one level deep, ignoring quoted text
fn bracket_still_open(text: &str, open: char, close: char) -> bool {
    let mut depth = 1usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for ch in text.chars() {
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
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return false;
                }
            }
            _ => {}
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signatures() -> LookupSignatures {
        LookupSignatures::new(&[
            "$t".to_string(),
            "this.$t".to_string(),
            "i18n.t".to_string(),
            "t".to_string(),
        ])
    }

    #[test]
    fn test_regex_initialization() {
        get_target_script_regex();
        get_plain_attribute_regex();
        get_binding_open_regex();
        get_benign_label_regex();
        get_code_signature_regex();
        get_path_prefix_regex();
        get_file_extension_regex();
        get_declaration_open_regex();
        get_type_alias_regex();
    }

    #[test]
    fn test_contains_target_script() {
        assert!(contains_target_script("请输入"));
        assert!(contains_target_script("共 3 条"));
        assert!(!contains_target_script("Submit"));
        assert!(!contains_target_script("！，。"));
    }

    #[test]
    fn test_already_localized_by_window() {
        let sig = signatures();
        let scan = r#"<el-input :placeholder="$t('请输入')">"#;
        let offset = scan.find("'请输入'").unwrap();
        assert!(sig.is_already_localized(scan, "'请输入'", offset));

        let scan = "const a = this.$t( '保存' );";
        let offset = scan.find("'保存'").unwrap();
        assert!(sig.is_already_localized(scan, "'保存'", offset));
    }

    #[test]
    fn test_not_localized_when_call_is_unrelated() {
        let sig = signatures();
        let scan = "emit('保存')";
        let offset = scan.find("'保存'").unwrap();
        assert!(!sig.is_already_localized(scan, "'保存'", offset));

        let scan = "alert('保存')";
        let offset = scan.find("'保存'").unwrap();
        assert!(!sig.is_already_localized(scan, "'保存'", offset));
    }

    #[test]
    fn test_already_localized_by_span() {
        let sig = signatures();
        assert!(sig.is_already_localized("", ">{{ $t('查询') }}<", 0));
        assert!(!sig.is_already_localized("", ">查询<", 0));
    }

    #[test]
    fn test_classify_plain_attribute() {
        let scan = r#"<el-input placeholder="请输入">"#;
        let offset = scan.find("\"请输入\"").unwrap();
        assert_eq!(
            classify_markup(scan, offset),
            Context::PlainAttribute {
                name_start: scan.find("placeholder").unwrap(),
            }
        );
    }

    #[test]
    fn test_classify_namespaced_plain_attribute() {
        let scan = r#"<use xlink:title="图标"/>"#;
        let offset = scan.find("\"图标\"").unwrap();
        assert_eq!(
            classify_markup(scan, offset),
            Context::PlainAttribute {
                name_start: scan.find("xlink").unwrap(),
            }
        );
    }

    #[test]
    fn test_classify_bound_attribute() {
        let scan = r#"<el-input :placeholder="'请输入'">"#;
        let offset = scan.find("'请输入'").unwrap();
        assert_eq!(
            classify_markup(scan, offset),
            Context::BoundAttribute { quote: '"' }
        );
    }

    #[test]
    fn test_classify_binding_expression() {
        let scan = r#"<el-button @click="confirm('确定删除吗', 'x')">"#;
        let offset = scan.find("'确定删除吗'").unwrap();
        assert_eq!(
            classify_markup(scan, offset),
            Context::BindingExpression { quote: '"' }
        );
    }

    #[test]
    fn test_classify_interpolation() {
        let scan = "<span>{{ ok ? '是' : '否' }}</span>";
        let offset = scan.find("'否'").unwrap();
        assert_eq!(classify_markup(scan, offset), Context::Interpolation);
    }

    #[test]
    fn test_classify_after_closed_binding_is_body() {
        let scan = r#"<a :href="url">'说明'</a>"#;
        let offset = scan.find("'说明'").unwrap();
        assert_eq!(classify_markup(scan, offset), Context::Body);
    }

    #[test]
    fn test_binding_value_with_escaped_quote() {
        let prefix = r#"<a :title='a ? \'x\' : "#;
        assert_eq!(
            open_binding_value(prefix),
            Some((":title".to_string(), '\''))
        );
    }

    #[test]
    fn test_code_like() {
        assert!(is_code_like("console.log('你好')"));
        assert!(is_code_like("const a = '中文'"));
        assert!(is_code_like("this.form.name 为空"));
        assert!(!is_code_like("请输入用户名"));
        assert!(!is_code_like("temperature(°C)"));
        assert!(!is_code_like("温度(℃)"));
        assert!(!is_code_like("你好，{name}"));
    }

    #[test]
    fn test_file_path_like() {
        assert!(is_file_path_like("./assets/logo.png"));
        assert!(is_file_path_like("@/assets/图标.svg"));
        assert!(is_file_path_like("图片.png"));
        assert!(!is_file_path_like("请上传图片"));
        assert!(!is_file_path_like("共 3 条 / 页"));
    }

    #[test]
    fn test_declaration_block() {
        let scan = "export default {\n  props: {\n    title: { type: String, default: '标题' }\n  },\n  data() { return { a: '内容' } }\n}";
        assert!(in_declaration_block(scan, scan.find("'标题'").unwrap()));
        assert!(!in_declaration_block(scan, scan.find("'内容'").unwrap()));

        let scan = "const props = withDefaults(defineProps<Props>(), { title: '标题' });\nconst b = '内容';";
        assert!(in_declaration_block(scan, scan.find("'标题'").unwrap()));
        assert!(!in_declaration_block(scan, scan.find("'内容'").unwrap()));
    }

    #[test]
    fn test_object_key() {
        let scan = "const map = { '名称': 1, \"类型\" : 2, label: '标签' };";
        let at = |lit: &str| {
            let start = scan.find(lit).unwrap();
            start..start + lit.len()
        };
        assert!(is_object_key(scan, at("'名称'")));
        assert!(is_object_key(scan, at("\"类型\"")));
        assert!(!is_object_key(scan, at("'标签'")));

        let scan = "const s = ok ? '是' : '否';";
        let start = scan.find("'是'").unwrap();
        assert!(!is_object_key(scan, start..start + "'是'".len()));
    }

    #[test]
    fn test_type_literal() {
        let scan = "type S = '启用' | '禁用';
type One = '单个';
const a = b || '默认';
const c = '普通';";
        let at = |lit: &str| {
            let start = scan.find(lit).unwrap();
            start..start + lit.len()
        };
        assert!(is_type_literal(scan, at("'启用'")));
        assert!(is_type_literal(scan, at("'禁用'")));
        assert!(is_type_literal(scan, at("'单个'")));
        assert!(!is_type_literal(scan, at("'默认'")));
        assert!(!is_type_literal(scan, at("'普通'")));
    }
}
