use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::MergePolicy;
use crate::fs::FileSystem;
use crate::registry::KeyRegistry;

// =============================================================================
// JSON Style Detection and Custom Formatting
// =============================================================================

/// Detected JSON formatting style from existing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStyle {
    /// Indentation string (e.g., "  ", "    ", "\t")
    pub indent: String,
    /// Whether the file uses CRLF line endings
    pub use_crlf: bool,
    /// Whether the file ends with a trailing newline
    pub trailing_newline: bool,
}

impl Default for JsonStyle {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            use_crlf: false,
            trailing_newline: true,
        }
    }
}

/// Detect JSON formatting style from file content
pub fn detect_json_style(content: &str) -> JsonStyle {
    let mut style = JsonStyle {
        use_crlf: content.contains("\r\n"),
        trailing_newline: content.ends_with('\n'),
        ..JsonStyle::default()
    };

    // The first indented key line carries the indentation unit
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('"') || trimmed.starts_with('}') {
            let indent_len = line.len() - trimmed.len();
            if indent_len > 0 {
                style.indent = line[..indent_len].to_string();
                break;
            }
        }
    }

    style
}

/// Pretty printer for flat objects that writes the detected style
struct StylePreservingFormatter {
    indent: Vec<u8>,
    newline: Vec<u8>,
    current_indent: usize,
}

impl StylePreservingFormatter {
    fn new(style: &JsonStyle) -> Self {
        Self {
            indent: style.indent.as_bytes().to_vec(),
            newline: if style.use_crlf {
                b"\r\n".to_vec()
            } else {
                b"\n".to_vec()
            },
            current_indent: 0,
        }
    }

    fn write_indent<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        for _ in 0..self.current_indent {
            writer.write_all(&self.indent)?;
        }
        Ok(())
    }
}

impl Formatter for StylePreservingFormatter {
    fn begin_object<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.current_indent += 1;
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.current_indent -= 1;
        writer.write_all(&self.newline)?;
        self.write_indent(writer)?;
        writer.write_all(b"}")
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        if !first {
            writer.write_all(b",")?;
        }
        writer.write_all(&self.newline)?;
        self.write_indent(writer)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }
}

/// Render a flat mapping in `style`
pub fn render_mapping(map: &Map<String, Value>, style: &JsonStyle) -> Result<String> {
    let newline = if style.use_crlf { "\r\n" } else { "\n" };
    let mut out = if map.is_empty() {
        "{}".to_string()
    } else {
        let mut buf = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buf, StylePreservingFormatter::new(style));
        map.serialize(&mut serializer)?;
        String::from_utf8(buf).context("Serialized JSON is not UTF-8")?
    };
    if style.trailing_newline {
        out.push_str(newline);
    }
    Ok(out)
}

pub fn sort_keys_alphabetically(map: &Map<String, Value>) -> Map<String, Value> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.into_iter()
        .filter_map(|k| map.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

// =============================================================================
// Merging
// =============================================================================

/// Same key, different text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    pub key: String,
    pub existing: String,
    pub incoming: String,
}

impl std::fmt::Display for KeyConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}': existing value '{}' differs from '{}'",
            self.key, self.existing, self.incoming
        )
    }
}

/// Result of merging keys into a key file
#[derive(Debug, Default)]
pub struct MergeResult {
    pub file_path: String,
    pub added: Vec<String>,
    /// Conflicting keys whose value was replaced (overwrite policy)
    pub updated: Vec<String>,
    pub conflicts: Vec<KeyConflict>,
    pub unchanged: usize,
}

impl MergeResult {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty()
    }
}

/// Parse a flat `{ "key": "text" }` file; an empty file is an empty mapping
pub fn parse_mapping(content: &str, path: &Path) -> Result<Map<String, Value>> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    let map: Map<String, Value> = serde_json::from_str(content)
        .with_context(|| format!("Failed to parse JSON in: {}", path.display()))?;
    if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_string()) {
        bail!(
            "{}: value of '{}' is not a string; key files must be flat",
            path.display(),
            key
        );
    }
    Ok(map)
}

/// Read a key file; a missing file is an empty mapping
pub fn read_mapping(path: &Path, fs: &dyn FileSystem) -> Result<Map<String, Value>> {
    if !fs.exists(path) {
        return Ok(Map::new());
    }
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("Failed to read key file: {}", path.display()))?;
    parse_mapping(&content, path)
}

/// Fold `incoming` into `target` under `policy`
pub fn merge_entries<'a>(
    target: &mut Map<String, Value>,
    incoming: impl IntoIterator<Item = (&'a str, &'a str)>,
    policy: MergePolicy,
) -> MergeResult {
    let mut result = MergeResult::default();

    for (key, value) in incoming {
        match target.get(key).and_then(Value::as_str) {
            None => {
                target.insert(key.to_string(), Value::String(value.to_string()));
                result.added.push(key.to_string());
            }
            Some(existing) if existing == value => result.unchanged += 1,
            Some(existing) => {
                result.conflicts.push(KeyConflict {
                    key: key.to_string(),
                    existing: existing.to_string(),
                    incoming: value.to_string(),
                });
                if policy == MergePolicy::Overwrite {
                    target.insert(key.to_string(), Value::String(value.to_string()));
                    result.updated.push(key.to_string());
                }
            }
        }
    }

    result
}

/// Merge a run's registry into the key file at `path` under an exclusive lock.
///
/// The file's indentation, line endings and trailing newline are kept. In a
/// dry run nothing is written but the result still reports the changes.
pub fn merge_registry_into_file(
    path: &Path,
    registry: &KeyRegistry,
    policy: MergePolicy,
    sort: bool,
    dry_run: bool,
    fs: &dyn FileSystem,
) -> Result<MergeResult> {
    merge_into_file(path, registry.iter(), policy, sort, dry_run, fs)
}

fn merge_into_file<'a>(
    path: &Path,
    incoming: impl IntoIterator<Item = (&'a str, &'a str)>,
    policy: MergePolicy,
    sort: bool,
    dry_run: bool,
    fs: &dyn FileSystem,
) -> Result<MergeResult> {
    if !dry_run {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs.create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let mut incoming = incoming.into_iter();
    let mut outcome: Option<MergeResult> = None;
    let mut update = |content: &str| -> Result<Option<String>> {
        let style = if content.trim().is_empty() {
            JsonStyle::default()
        } else {
            detect_json_style(content)
        };
        let mut map = parse_mapping(content, path)?;
        let mut result = merge_entries(&mut map, incoming.by_ref(), policy);
        result.file_path = path.display().to_string();

        let sorted = sort.then(|| sort_keys_alphabetically(&map));
        let reordered = sorted
            .as_ref()
            .map_or(false, |sorted| !sorted.keys().eq(map.keys()));

        let write =
            !dry_run && (result.has_changes() || reordered || content.trim().is_empty());
        outcome = Some(result);
        if !write {
            return Ok(None);
        }
        render_mapping(&sorted.unwrap_or(map), &style).map(Some)
    };

    if dry_run {
        let content = if fs.exists(path) {
            fs.read_to_string(path)
                .with_context(|| format!("Failed to read key file: {}", path.display()))?
        } else {
            String::new()
        };
        update(&content)?;
    } else {
        fs.update_locked(path, &mut update)
            .with_context(|| format!("Failed to update key file: {}", path.display()))?;
    }

    Ok(outcome.unwrap_or_default())
}

/// Merge several flat key files into `target`, in argument order
pub fn merge_files(
    sources: &[PathBuf],
    target: &Path,
    policy: MergePolicy,
    sort: bool,
    dry_run: bool,
    fs: &dyn FileSystem,
) -> Result<MergeResult> {
    let mut combined = Map::new();
    let mut source_conflicts = Vec::new();
    for source in sources {
        if !fs.is_file(source) {
            bail!("Source key file not found: {}", source.display());
        }
        let map = read_mapping(source, fs)?;
        let entries = map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)));
        source_conflicts.extend(merge_entries(&mut combined, entries, policy).conflicts);
    }

    let entries = combined
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)));
    let mut result = merge_into_file(target, entries, policy, sort, dry_run, fs)?;
    source_conflicts.extend(result.conflicts);
    result.conflicts = source_conflicts;
    Ok(result)
}

// =============================================================================
// Diff
// =============================================================================

/// Key-level difference between two mappings
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MappingDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// (key, old text, new text)
    pub changed: Vec<(String, String, String)>,
}

impl MappingDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Keys added, removed and changed going from `old` to `new`, each sorted
pub fn diff_mappings(old: &Map<String, Value>, new: &Map<String, Value>) -> MappingDiff {
    let mut diff = MappingDiff::default();

    for (key, value) in new {
        match old.get(key) {
            None => diff.added.push(key.clone()),
            Some(previous) if previous != value => diff.changed.push((
                key.clone(),
                previous.as_str().unwrap_or_default().to_string(),
                value.as_str().unwrap_or_default().to_string(),
            )),
            Some(_) => {}
        }
    }
    diff.removed = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();

    diff.added.sort();
    diff.removed.sort();
    diff.changed.sort();
    diff
}
