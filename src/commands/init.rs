use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::{Config, DEFAULT_CONFIG_FILE};

pub fn run(force: bool) -> Result<()> {
    println!("=== i18n-autowrap init ===\n");

    let config_path = Path::new(DEFAULT_CONFIG_FILE);

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let config_str = serde_json::to_string_pretty(&config)?;
    std::fs::write(config_path, format!("{}\n", config_str))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Created configuration file: {}\n", config_path.display());
    println!("Configuration:");
    println!("  Extensions: {:?}", config.file_extensions);
    println!("  Ignore paths: {:?}", config.ignore_paths);
    println!("  Output: {}", config.output);
    println!(
        "  Vue methods: {} (template), {} (script)",
        config.vue.i18n_method.template, config.vue.i18n_method.script
    );

    println!("\nNext steps:");
    println!("  1. Adjust the import statements for your project");
    println!("  2. Run 'i18n-autowrap extract src --dry-run' to preview the rewrite");

    println!("\nDone!");
    Ok(())
}
