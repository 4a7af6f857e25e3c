use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::MergePolicy;
use crate::fs::RealFileSystem;
use crate::json_sync;

pub fn run(sources: &[PathBuf], output: &Path, policy: MergePolicy, sort: bool) -> Result<()> {
    println!("=== i18n-autowrap merge ===\n");

    println!("Sources:");
    for source in sources {
        println!("  {}", source.display());
    }
    println!("Output: {}\n", output.display());

    let result = json_sync::merge_files(sources, output, policy, sort, false, &RealFileSystem)?;

    println!("Merge Summary:");
    println!("  Added: {}", result.added.len());
    println!("  Updated: {}", result.updated.len());
    println!("  Unchanged: {}", result.unchanged);
    if !result.conflicts.is_empty() {
        println!("\nConflicts ({:?}):", policy);
        for conflict in &result.conflicts {
            println!("  {}", conflict);
        }
    }

    println!("\nDone!");
    Ok(())
}
