use anyhow::Result;
use std::path::Path;

use crate::fs::RealFileSystem;
use crate::json_sync;

pub fn run(old: &Path, new: &Path) -> Result<()> {
    let fs = RealFileSystem;
    let old_map = json_sync::read_mapping(old, &fs)?;
    let new_map = json_sync::read_mapping(new, &fs)?;
    let diff = json_sync::diff_mappings(&old_map, &new_map);

    println!("=== i18n-autowrap diff ===\n");
    println!("{} -> {}", old.display(), new.display());
    println!("{}", "-".repeat(60));

    if diff.is_empty() {
        println!("No differences.");
        return Ok(());
    }

    for key in &diff.added {
        println!("+ {}", key);
    }
    for key in &diff.removed {
        println!("- {}", key);
    }
    for (key, before, after) in &diff.changed {
        println!("~ {}: {} -> {}", key, before, after);
    }

    println!("{}", "-".repeat(60));
    println!(
        "Added: {}, removed: {}, changed: {}",
        diff.added.len(),
        diff.removed.len(),
        diff.changed.len()
    );
    Ok(())
}
