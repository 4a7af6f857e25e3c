use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use i18n_autowrap::commands;
use i18n_autowrap::commands::extract::ExtractOptions;
use i18n_autowrap::config::{Config, MergePolicy};
use i18n_autowrap::logging::{self, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "i18n-autowrap")]
#[command(author, version, about = "Rewrite Chinese UI text into i18n lookup calls", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info or debug (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite literals under PATH and merge the keys into the key file
    Extract {
        /// File or directory to process
        path: PathBuf,

        /// Key file (overrides config)
        #[arg(short, long)]
        output: Option<String>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Conflict policy (overrides config)
        #[arg(long, value_enum)]
        policy: Option<MergePolicy>,

        /// Sort keys alphabetically in the key file
        #[arg(long)]
        sort: bool,
    },

    /// Merge several key files into one
    Merge {
        /// Key files to merge, first one wins under keep-first
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Target key file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "keep-first")]
        policy: MergePolicy,

        #[arg(long)]
        sort: bool,
    },

    /// Show keys added, removed and changed between two key files
    Diff { old: PathBuf, new: PathBuf },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(level) = LogLevel::parse(&cli.log_level) else {
        bail!(
            "Invalid log level '{}': expected error, warn, info or debug",
            cli.log_level
        );
    };
    logging::init(level);

    match cli.command {
        Commands::Extract {
            path,
            output,
            dry_run,
            policy,
            sort,
        } => {
            let config = Config::load_or_default(cli.config.as_ref())?;
            commands::extract::run(
                &config,
                &ExtractOptions {
                    path,
                    output,
                    dry_run,
                    policy,
                    sort,
                },
            )?;
        }
        Commands::Merge {
            sources,
            output,
            policy,
            sort,
        } => {
            commands::merge::run(&sources, &output, policy, sort)?;
        }
        Commands::Diff { old, new } => {
            commands::diff::run(&old, &new)?;
        }
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
    }

    Ok(())
}
