//! Single-file component sections and lookup wiring.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Section flavour inside a component file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Template,
    Script,
}

/// Inner content of a `<template>` or `<script>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    /// Byte range of the content between the opening and closing tags
    pub range: Range<usize>,
}

static IMPORT_REGEX: OnceLock<Regex> = OnceLock::new();

/// A complete `import … 'module'` statement, possibly spanning lines
fn get_import_regex() -> &'static Regex {
    IMPORT_REGEX.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*import\b[^'"]*['"][^'"\n]*['"];?"#)
            .expect("IMPORT_REGEX pattern is invalid - this is a bug")
    })
}

/// Locate the root template and every script block, in file order.
///
/// The template runs from the end of the first `<template…>` tag to the last
/// `</template>`, so nested `<template #slot>` tags stay inside it. Style
/// blocks are not reported.
pub fn split_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();

    let template = find_open_tag(content, "<template", 0).and_then(|(_, inner_start)| {
        content
            .rfind("</template>")
            .filter(|&end| end >= inner_start)
            .map(|end| inner_start..end)
    });
    if let Some(range) = &template {
        sections.push(Section {
            kind: SectionKind::Template,
            range: range.clone(),
        });
    }

    let mut search = 0;
    while let Some((tag_start, inner_start)) = find_open_tag(content, "<script", search) {
        let Some(close) = content[inner_start..].find("</script>") else {
            break;
        };
        let inner_end = inner_start + close;
        search = inner_end + "</script>".len();

        let inside_template = template
            .as_ref()
            .map_or(false, |t| t.start <= tag_start && tag_start < t.end);
        if !inside_template {
            sections.push(Section {
                kind: SectionKind::Script,
                range: inner_start..inner_end,
            });
        }
    }

    sections.sort_by_key(|s| s.range.start);
    sections
}

/// Start of `tag` (followed by whitespace or `>`) at or after `from`, and the
/// byte after its closing `>`
fn find_open_tag(content: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(found) = content[search..].find(tag) {
        let start = search + found;
        let after = start + tag.len();
        let boundary = content[after..]
            .chars()
            .next()
            .map_or(false, |c| c == '>' || c.is_whitespace());
        if boundary {
            let close = content[after..].find('>')?;
            return Some((start, after + close + 1));
        }
        search = after;
    }
    None
}

/// Insert `import` after the last import statement of `script` (or at its
/// top) and `instance` right after it. Statements already present, or empty,
/// are not inserted.
pub fn wire_statements(script: &str, import: &str, instance: &str) -> String {
    let mut out = script.to_string();
    let mut cursor = insertion_point(&out);

    for statement in [import.trim(), instance.trim()] {
        if statement.is_empty() || out.contains(statement) {
            continue;
        }
        let line = if cursor > 0 && !out[..cursor].ends_with('\n') {
            format!("\n{}", statement)
        } else {
            format!("{}\n", statement)
        };
        out.insert_str(cursor, &line);
        cursor += line.len();
    }

    out
}

fn insertion_point(script: &str) -> usize {
    match get_import_regex().find_iter(script).last() {
        Some(m) => match script[m.end()..].find('\n') {
            Some(nl) => m.end() + nl + 1,
            None => script.len(),
        },
        None if script.starts_with("\r\n") => 2,
        None if script.starts_with('\n') => 1,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMPONENT: &str = "<template>\n  <div>\n    <template #footer><b>底部</b></template>\n  </div>\n</template>\n\n<script>\nexport default {}\n</script>\n\n<style>\n.a { color: red; }\n</style>\n";

    #[test]
    fn test_regex_initialization() {
        get_import_regex();
    }

    #[test]
    fn test_split_sections() {
        let sections = split_sections(COMPONENT);
        assert_eq!(sections.len(), 2);

        let template = &COMPONENT[sections[0].range.clone()];
        assert_eq!(sections[0].kind, SectionKind::Template);
        assert!(template.contains("<template #footer>"));
        assert!(template.ends_with("</div>\n"));

        assert_eq!(sections[1].kind, SectionKind::Script);
        assert_eq!(
            &COMPONENT[sections[1].range.clone()],
            "\nexport default {}\n"
        );
    }

    #[test]
    fn test_script_setup_and_plain_script() {
        let content = "<script setup lang=\"ts\">\nconst a = 1\n</script>\n<template><p>x</p></template>\n<script>\nexport default {}\n</script>";
        let sections = split_sections(content);
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SectionKind::Script, SectionKind::Template, SectionKind::Script]
        );
        assert_eq!(&content[sections[1].range.clone()], "<p>x</p>");
    }

    #[test]
    fn test_scriptx_tag_is_not_script() {
        assert!(split_sections("<scripts>a</scripts>").is_empty());
    }

    #[test]
    fn test_wire_after_last_import() {
        let script = "\nimport a from 'a'\nimport {\n  b,\n  c\n} from \"b\";\nexport default {}\n";
        let wired = wire_statements(script, "import i18n from '@/i18n';", "");
        assert_eq!(
            wired,
            "\nimport a from 'a'\nimport {\n  b,\n  c\n} from \"b\";\nimport i18n from '@/i18n';\nexport default {}\n"
        );
    }

    #[test]
    fn test_wire_at_top_and_instance_follows() {
        let script = "\nconst a = 1\n";
        let wired = wire_statements(
            script,
            "import { useI18n } from 'vue-i18n'",
            "const { t } = useI18n()",
        );
        assert_eq!(
            wired,
            "\nimport { useI18n } from 'vue-i18n'\nconst { t } = useI18n()\nconst a = 1\n"
        );
    }

    #[test]
    fn test_wire_is_idempotent() {
        let script = "import i18n from '@/i18n';\nconst a = 1;";
        assert_eq!(wire_statements(script, "import i18n from '@/i18n';", ""), script);
    }

    #[test]
    fn test_wire_after_import_without_trailing_newline() {
        let wired = wire_statements("import a from 'a'", "import b from 'b'", "");
        assert_eq!(wired, "import a from 'a'\nimport b from 'b'");
    }
}
