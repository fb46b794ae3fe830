//! oxide-schemadiff CLI
//!
//! Command-line tool that diffs two model versions into SQL.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_schemadiff::prelude::*;

/// Rename-aware schema diffing.
#[derive(Parser)]
#[command(name = "oxide-schemadiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// SQL statements.
    Sql,
    /// A JSON migration script.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the operations turning one model version into another.
    Diff {
        /// Previous model (JSON).
        #[arg(long)]
        prev: PathBuf,

        /// New model (JSON).
        #[arg(long)]
        new: PathBuf,

        /// Rename hints (JSON).
        #[arg(short, long)]
        renames: Option<PathBuf>,

        /// Target dialect: postgres, sqlite or oracle.
        #[arg(short, long, env = "SCHEMADIFF_DIALECT", default_value = "postgres")]
        dialect: String,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "sql")]
        format: OutputFormat,

        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Merge consecutive ALTER TABLE clauses into one statement.
        #[arg(long)]
        combine_alters: bool,

        /// Script name/description.
        #[arg(short, long)]
        name: Option<String>,

        /// Do not treat empty strings as missing values in backfills.
        #[arg(long)]
        no_empty_string_sentinel: bool,
    },

    /// Render a saved JSON script as SQL.
    Sql {
        /// Script file.
        script: PathBuf,

        /// Merge consecutive ALTER TABLE clauses into one statement.
        #[arg(long)]
        combine_alters: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Diff {
            prev,
            new,
            renames,
            dialect,
            format,
            output,
            combine_alters,
            name,
            no_empty_string_sentinel,
        } => {
            let prev_model = Model::from_json_file(&prev)
                .with_context(|| format!("reading {}", prev.display()))?;
            let new_model = Model::from_json_file(&new)
                .with_context(|| format!("reading {}", new.display()))?;
            let hints = match &renames {
                Some(path) => RenameHints::from_json_file(path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => RenameHints::new(),
            };

            let dialect =
                dialect_by_name(&dialect).ok_or_else(|| anyhow!("unknown dialect '{}'", dialect))?;
            let differ = SchemaDiffer::from_boxed(dialect).with_options(DiffOptions {
                empty_string_sentinel: !no_empty_string_sentinel,
            });
            let operations = differ.diff(&prev_model, &new_model, &hints)?;

            if operations.is_empty() {
                info!("No changes detected.");
            }

            let description = name.unwrap_or_else(|| "auto".to_string());
            let script = MigrationScript::new(
                script_name(1, &description),
                differ.dialect().name(),
                operations,
            );

            match (format, output) {
                (OutputFormat::Json, Some(path)) => script.write_json(&path)?,
                (OutputFormat::Json, None) => println!("{}", script.to_json()?),
                (OutputFormat::Sql, Some(path)) => {
                    std::fs::write(&path, script.to_sql(combine_alters))?;
                    info!("Wrote {}", path.display());
                }
                (OutputFormat::Sql, None) => print!("{}", script.to_sql(combine_alters)),
            }
        }

        Commands::Sql {
            script,
            combine_alters,
        } => {
            let loaded = MigrationScript::read_json(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            info!(
                "Script {} ({}), generated {}",
                loaded.name,
                loaded.dialect,
                loaded.generated_at.format("%Y-%m-%d %H:%M:%S")
            );
            print!("{}", loaded.to_sql(combine_alters));
        }
    }

    Ok(())
}
