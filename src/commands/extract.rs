use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::config::{Config, MergePolicy};
use crate::discover;
use crate::fs::RealFileSystem;
use crate::json_sync;
use crate::pipeline::{self, FileStatus};

pub struct ExtractOptions {
    pub path: PathBuf,
    /// Key file (overrides config)
    pub output: Option<String>,
    pub dry_run: bool,
    pub policy: Option<MergePolicy>,
    pub sort: bool,
}

pub fn run(config: &Config, options: &ExtractOptions) -> Result<()> {
    println!("=== i18n-autowrap extract ===\n");

    let output = options.output.as_ref().unwrap_or(&config.output);
    let policy = options.policy.unwrap_or(config.merge_policy);
    let sort = options.sort || config.sort_keys;

    println!("Configuration:");
    println!("  Path: {}", options.path.display());
    println!("  Extensions: {:?}", config.file_extensions);
    println!("  Output: {}", output);
    println!("  Merge policy: {:?}", policy);
    if options.dry_run {
        println!("  Dry run: files are not written");
    }
    println!();

    let discovery = discover::discover_files(&options.path, config)?;
    if discovery.files.is_empty() {
        println!("No source files found.");
        return Ok(());
    }

    let fs = RealFileSystem;
    let batch = pipeline::run_batch(&discovery.files, config, &fs, options.dry_run);

    println!("Rewritten files:");
    println!("{}", "-".repeat(60));
    for file in &batch.files {
        if let FileStatus::Rewritten { replaced } = file.status {
            println!("  {} ({} replaced)", file.path.display(), replaced);
        }
    }
    println!("{}", "-".repeat(60));

    let failures: Vec<_> = batch.failures().collect();
    if !failures.is_empty() {
        eprintln!("\nFailed files:");
        for file in &failures {
            if let FileStatus::Failed { message } = &file.status {
                eprintln!("  {}: {}", file.path.display(), message);
            }
        }
        eprintln!();
    }

    let summary = batch.summary();
    println!("\nExtraction Summary:");
    println!("  Files scanned: {}", summary.files_scanned);
    println!("  Files succeeded: {}", summary.files_succeeded);
    println!("  Files rewritten: {}", summary.files_rewritten);
    if summary.files_failed > 0 {
        println!("  Files failed: {}", summary.files_failed);
    }
    if discovery.skipped > 0 {
        println!("  Paths skipped: {}", discovery.skipped);
    }
    println!("  Terms extracted: {}", summary.terms_extracted);
    println!("  Unique keys: {}", summary.unique_keys);

    println!("\nSyncing key file...");
    let result = json_sync::merge_registry_into_file(
        Path::new(output),
        &batch.registry,
        policy,
        sort,
        options.dry_run,
        &fs,
    )?;
    if result.added.is_empty() {
        println!("  No new keys added (all keys already exist).");
    } else {
        println!("  {} - added {} new key(s)", result.file_path, result.added.len());
    }
    if !result.updated.is_empty() {
        println!("  {} - updated {} key(s)", result.file_path, result.updated.len());
    }
    for conflict in &result.conflicts {
        println!("  Conflict {}", conflict);
    }

    if summary.files_failed > 0 {
        bail!("{} file(s) failed", summary.files_failed);
    }

    println!("\nDone!");
    Ok(())
}
