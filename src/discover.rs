//! Source file discovery.

use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, RewriteError};

/// Files found under a root
#[derive(Debug, Default)]
pub struct Discovery {
    /// Eligible files, sorted
    pub files: Vec<PathBuf>,
    /// Entries that could not be read while walking
    pub skipped: usize,
}

/// An `ignorePaths` entry: a literal name or a wildcard pattern
enum IgnoreRule {
    Name(String),
    Wildcard(Pattern),
}

impl IgnoreRule {
    fn matches(&self, name: &str, relative: &Path) -> bool {
        match self {
            IgnoreRule::Name(literal) => {
                name == literal || relative == Path::new(literal)
            }
            IgnoreRule::Wildcard(pattern) => {
                pattern.matches(name) || pattern.matches_path(relative)
            }
        }
    }
}

fn compile_ignore_rules(patterns: &[String]) -> Result<Vec<IgnoreRule>> {
    patterns
        .iter()
        .map(|p| {
            if p.contains('*') || p.contains('?') || p.contains('[') {
                Pattern::new(p)
                    .map(IgnoreRule::Wildcard)
                    .map_err(|e| RewriteError::InvalidIgnorePattern {
                        pattern: p.clone(),
                        message: e.to_string(),
                    })
            } else {
                Ok(IgnoreRule::Name(p.trim_end_matches('/').to_string()))
            }
        })
        .collect()
}

fn has_eligible_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Collect every eligible file under `root`.
///
/// A missing root is fatal. A file root is returned alone when its extension
/// is eligible. Ignored directories are pruned, not descended into.
pub fn discover_files(root: &Path, config: &Config) -> Result<Discovery> {
    if !root.exists() {
        return Err(RewriteError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    if root.is_file() {
        let files = if has_eligible_extension(root, &config.file_extensions) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
        return Ok(Discovery { files, skipped: 0 });
    }

    let rules = compile_ignore_rules(&config.ignore_paths)?;
    let mut discovery = Discovery::default();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let ignored = rules.iter().any(|rule| rule.matches(&name, relative));
        if ignored {
            debug!("ignoring {}", entry.path().display());
        }
        !ignored
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("cannot access path: {}", e);
                discovery.skipped += 1;
                continue;
            }
        };
        if entry.file_type().is_file()
            && has_eligible_extension(entry.path(), &config.file_extensions)
        {
            discovery.files.push(entry.into_path());
        }
    }

    discovery.files.sort();
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = discover_files(&dir.path().join("nope"), &Config::default()).unwrap_err();
        assert!(matches!(err, RewriteError::RootNotFound { .. }));
    }

    #[test]
    fn test_walk_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/b.vue");
        touch(root, "src/a.ts");
        touch(root, "src/style.css");
        touch(root, "node_modules/lib/index.js");
        touch(root, "src/gen/api.generated.js");

        let mut config = Config::default();
        config.ignore_paths.push("*.generated.js".to_string());

        let found = discover_files(root, &config).unwrap();
        let rel: Vec<String> = found
            .files
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(rel, vec!["src/a.ts", "src/b.vue"]);
    }

    #[test]
    fn test_relative_path_rule() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/legacy/old.js");
        touch(root, "src/new.js");

        let mut config = Config::default();
        config.ignore_paths = vec!["src/legacy".to_string()];

        let found = discover_files(root, &config).unwrap();
        assert_eq!(found.files.len(), 1);
        assert!(found.files[0].ends_with("new.js"));
    }

    #[test]
    fn test_file_root() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "page.vue");
        touch(dir.path(), "notes.md");
        let config = Config::default();

        let found = discover_files(&dir.path().join("page.vue"), &config).unwrap();
        assert_eq!(found.files.len(), 1);
        let found = discover_files(&dir.path().join("notes.md"), &config).unwrap();
        assert!(found.files.is_empty());
    }

    #[test]
    fn test_invalid_wildcard_rejected() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.ignore_paths = vec!["[*".to_string()];
        let err = discover_files(dir.path(), &config).unwrap_err();
        assert!(matches!(err, RewriteError::InvalidIgnorePattern { .. }));
    }
}
