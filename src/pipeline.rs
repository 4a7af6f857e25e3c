//! Per-file pipeline and batch driver.
//!
//! normalize -> extract -> rewrite runs to completion for one buffer at a
//! time. Files are independent, so a batch fans out over rayon and merges the
//! per-file registries afterwards.

use anyhow::Context as _;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::classify::LookupSignatures;
use crate::config::{Config, ScriptConfig};
use crate::error::{Result, RewriteError};
use crate::fs::FileSystem;
use crate::registry::KeyRegistry;
use crate::rewrite::{self, Buffer, RewriteContext};
use crate::sfc::{self, SectionKind};
use crate::terms::{ScanContext, TermExtractor};

/// Source dialect, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Vue,
    TypeScript,
    JavaScript,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "vue" => Some(Self::Vue),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            _ => None,
        }
    }
}

/// Result of transforming one buffer
#[derive(Debug, Default)]
pub struct FileTransform {
    pub output: String,
    /// Candidate terms accepted by the extractor
    pub terms: usize,
    /// Terms that produced a mutation
    pub replaced: usize,
    pub registry: KeyRegistry,
}

/// Lookup configuration resolved once per run
#[derive(Debug, Clone)]
pub struct Rewriter<'a> {
    config: &'a Config,
    extractor: TermExtractor,
}

impl<'a> Rewriter<'a> {
    pub fn new(config: &'a Config) -> Self {
        let signatures = LookupSignatures::new(&config.lookup_methods());
        Self {
            config,
            extractor: TermExtractor::new(signatures, &config.vue.text_elements),
        }
    }

    pub fn transform(&self, source: &str, dialect: Dialect) -> Result<FileTransform> {
        match dialect {
            Dialect::Vue => self.transform_component(source),
            Dialect::TypeScript => self.transform_module(source, &self.config.typescript),
            Dialect::JavaScript => self.transform_module(source, &self.config.javascript),
        }
    }

    fn transform_module(
        &self,
        source: &str,
        script: &ScriptConfig,
    ) -> Result<FileTransform> {
        let mut transform = FileTransform::default();
        let output = self.rewrite_section(
            source,
            ScanContext::Script,
            &script.i18n_method,
            &mut transform,
        )?;
        transform.output = if transform.replaced > 0 {
            sfc::wire_statements(&output, &script.import_statement, "")
        } else {
            output
        };
        Ok(transform)
    }

    fn transform_component(&self, source: &str) -> Result<FileTransform> {
        let vue = &self.config.vue;
        let mut transform = FileTransform::default();
        let mut output = source.to_string();

        // Back to front so earlier ranges stay valid
        for section in sfc::split_sections(source).into_iter().rev() {
            let content = &source[section.range.clone()];
            let before = transform.replaced;
            let rewritten = match section.kind {
                SectionKind::Template => self.rewrite_section(
                    content,
                    ScanContext::Template,
                    &vue.i18n_method.template,
                    &mut transform,
                )?,
                SectionKind::Script => {
                    let rewritten = self.rewrite_section(
                        content,
                        ScanContext::Script,
                        &vue.i18n_method.script,
                        &mut transform,
                    )?;
                    if transform.replaced > before {
                        sfc::wire_statements(
                            &rewritten,
                            &vue.import_statement,
                            &vue.instance_statement,
                        )
                    } else {
                        rewritten
                    }
                }
            };
            output.replace_range(section.range, &rewritten);
        }

        transform.output = output;
        Ok(transform)
    }

    fn rewrite_section(
        &self,
        content: &str,
        context: ScanContext,
        method: &str,
        transform: &mut FileTransform,
    ) -> Result<String> {
        let buffer = Buffer::new(content, context);
        let terms = self.extractor.extract(buffer.scan(), context);
        transform.terms += terms.len();
        if terms.is_empty() {
            return Ok(content.to_string());
        }

        let ctx = RewriteContext {
            method,
            signatures: self.extractor.signatures(),
        };
        let outcome = rewrite::rewrite(buffer, &terms, &ctx, &mut transform.registry)?;
        transform.replaced += outcome.replaced;
        Ok(outcome.buffer.into_source())
    }
}

/// Transform `source` written in `dialect`
pub fn transform_source(source: &str, dialect: Dialect, config: &Config) -> Result<FileTransform> {
    Rewriter::new(config).transform(source, dialect)
}

/// Outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// The file was (or, in a dry run, would be) rewritten
    Rewritten { replaced: usize },
    Unchanged,
    Failed { message: String },
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub terms: usize,
    pub registry: KeyRegistry,
}

impl FileReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

/// Read, transform and (unless `dry_run`) write back one file.
///
/// Every failure is captured in the report; nothing here aborts a batch.
pub fn process_file(
    path: &Path,
    rewriter: &Rewriter<'_>,
    fs: &dyn FileSystem,
    dry_run: bool,
) -> FileReport {
    match try_process_file(path, rewriter, fs, dry_run) {
        Ok((transform, changed)) => {
            let status = if changed {
                FileStatus::Rewritten {
                    replaced: transform.replaced,
                }
            } else {
                FileStatus::Unchanged
            };
            debug!(
                "{}: {} terms, {} replaced",
                path.display(),
                transform.terms,
                transform.replaced
            );
            FileReport {
                path: path.to_path_buf(),
                status,
                terms: transform.terms,
                registry: transform.registry,
            }
        }
        Err(e) => {
            warn!("{}: {:#}", path.display(), e);
            FileReport {
                path: path.to_path_buf(),
                status: FileStatus::Failed {
                    message: format!("{:#}", e),
                },
                terms: 0,
                registry: KeyRegistry::new(),
            }
        }
    }
}

fn try_process_file(
    path: &Path,
    rewriter: &Rewriter<'_>,
    fs: &dyn FileSystem,
    dry_run: bool,
) -> anyhow::Result<(FileTransform, bool)> {
    let dialect = Dialect::from_path(path).ok_or_else(|| RewriteError::UnsupportedFile {
        path: path.to_path_buf(),
    })?;
    let source = fs
        .read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let transform = rewriter
        .transform(&source, dialect)
        .with_context(|| format!("Failed to rewrite {}", path.display()))?;

    let changed = transform.output != source;
    if changed && !dry_run {
        fs.write(path, &transform.output)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok((transform, changed))
}

/// Counters printed at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files_scanned: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub files_rewritten: usize,
    pub terms_extracted: usize,
    pub unique_keys: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// One report per input file, in input order
    pub files: Vec<FileReport>,
    /// Union of every file's registry
    pub registry: KeyRegistry,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            files_scanned: self.files.len(),
            unique_keys: self.registry.len(),
            ..BatchSummary::default()
        };
        for file in &self.files {
            match file.status {
                FileStatus::Failed { .. } => summary.files_failed += 1,
                FileStatus::Rewritten { .. } => {
                    summary.files_succeeded += 1;
                    summary.files_rewritten += 1;
                }
                FileStatus::Unchanged => summary.files_succeeded += 1,
            }
            summary.terms_extracted += file.terms;
        }
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_failed())
    }
}

/// Process `files` in parallel and merge their registries in input order
pub fn run_batch(
    files: &[PathBuf],
    config: &Config,
    fs: &dyn FileSystem,
    dry_run: bool,
) -> BatchReport {
    let rewriter = Rewriter::new(config);

    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| process_file(path, &rewriter, fs, dry_run))
        .collect();

    let mut registry = KeyRegistry::new();
    for report in &reports {
        for key in registry.merge(&report.registry) {
            warn!("{}: key '{}' already registered with another value", report.path.display(), key);
        }
    }

    let batch = BatchReport {
        files: reports,
        registry,
    };
    let summary = batch.summary();
    info!(
        "scanned {} files: {} succeeded, {} failed, {} terms, {} unique keys",
        summary.files_scanned,
        summary.files_succeeded,
        summary.files_failed,
        summary.terms_extracted,
        summary.unique_keys
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::InMemoryFileSystem;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(Dialect::from_path(Path::new("a/B.vue")), Some(Dialect::Vue));
        assert_eq!(Dialect::from_path(Path::new("x.tsx")), Some(Dialect::TypeScript));
        assert_eq!(Dialect::from_path(Path::new("x.mjs")), Some(Dialect::JavaScript));
        assert_eq!(Dialect::from_path(Path::new("x.css")), None);
    }

    #[test]
    fn test_component_sections_use_their_own_method() {
        let source = "<template>\n  <el-button>查询</el-button>\n</template>\n\n<script>\nexport default {\n  methods: {\n    ok() { this.msg = '成功' }\n  }\n}\n</script>\n";
        let transform = transform_source(source, Dialect::Vue, &Config::default()).unwrap();
        assert_eq!(
            transform.output,
            "<template>\n  <el-button>{{ $t('查询') }}</el-button>\n</template>\n\n<script>\nexport default {\n  methods: {\n    ok() { this.msg = this.$t('成功') }\n  }\n}\n</script>\n"
        );
        assert_eq!(transform.replaced, 2);
        assert_eq!(transform.registry.len(), 2);
    }

    #[test]
    fn test_module_gets_import_once() {
        let source = "import axios from 'axios'\n\nexport const a = '保存'\nexport const b = '取消'\n";
        let transform = transform_source(source, Dialect::TypeScript, &Config::default()).unwrap();
        assert_eq!(
            transform.output,
            "import axios from 'axios'\nimport i18n from '@/i18n';\n\nexport const a = i18n.t('保存')\nexport const b = i18n.t('取消')\n"
        );

        let again =
            transform_source(&transform.output, Dialect::TypeScript, &Config::default()).unwrap();
        assert_eq!(again.output, transform.output);
        assert_eq!(again.replaced, 0);
    }

    #[test]
    fn test_untouched_module_gets_no_import() {
        let source = "export const a = 'hello'\n";
        let transform = transform_source(source, Dialect::JavaScript, &Config::default()).unwrap();
        assert_eq!(transform.output, source);
    }

    #[test]
    fn test_vue_wiring_statements() {
        let mut config = Config::default();
        config.vue.import_statement = "import { useI18n } from 'vue-i18n'".to_string();
        config.vue.instance_statement = "const { t } = useI18n()".to_string();
        config.vue.i18n_method.script = "t".to_string();

        let source = "<script setup>\nconst title = '标题'\n</script>\n";
        let transform = transform_source(source, Dialect::Vue, &config).unwrap();
        assert_eq!(
            transform.output,
            "<script setup>\nimport { useI18n } from 'vue-i18n'\nconst { t } = useI18n()\nconst title = t('标题')\n</script>\n"
        );
    }

    #[test]
    fn test_batch_isolates_failures() {
        let fs = InMemoryFileSystem::new();
        let overflow: String = (0..27).map(|i| format!("项${{v{}}}", i)).collect();
        fs.add_file("/p/bad.js", format!("const a = `{}`;\n", overflow));
        fs.add_file("/p/good.js", "const a = '保存';\n");
        fs.add_file("/p/other.js", "const b = '保存';\n");

        let files = vec![
            PathBuf::from("/p/bad.js"),
            PathBuf::from("/p/good.js"),
            PathBuf::from("/p/missing.js"),
            PathBuf::from("/p/other.js"),
        ];
        let batch = run_batch(&files, &Config::default(), &fs, false);
        let summary = batch.summary();

        assert_eq!(summary.files_scanned, 4);
        assert_eq!(summary.files_failed, 2);
        assert_eq!(summary.files_succeeded, 2);
        assert_eq!(summary.unique_keys, 1);
        assert_eq!(batch.registry.get("保存"), Some("保存"));

        let written = fs.get_files();
        assert!(written[Path::new("/p/good.js")].contains("i18n.t('保存')"));
        assert!(written[Path::new("/p/bad.js")].contains('`'));
    }

    #[test]
    fn test_dry_run_leaves_files() {
        let fs = InMemoryFileSystem::new();
        fs.add_file("/p/a.js", "const a = '保存';\n");
        let batch = run_batch(&[PathBuf::from("/p/a.js")], &Config::default(), &fs, true);

        assert_eq!(
            batch.files[0].status,
            FileStatus::Rewritten { replaced: 1 }
        );
        assert_eq!(fs.get_files()[Path::new("/p/a.js")], "const a = '保存';\n");
        assert_eq!(batch.registry.len(), 1);
    }
}
