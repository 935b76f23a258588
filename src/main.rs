//! tabform CLI
//!
//! Entry point for the command-line tool.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use tabform::export::{exporters_for, ExportParams};
use tabform::serialize::TableSql;
use tabform::{BadVal, Config, Pipeline, PipelineOptions};

#[derive(Parser, Debug)]
#[command(name = "tabform")]
#[command(about = "Typed validator and reformatter for TSV data packages", long_about = None)]
struct Args {
    /// Package directories to process (overrides the config file)
    packages: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "tabform.toml")]
    config: PathBuf,

    /// Override export formats (json, natural-json, xml, sql, msgpack)
    #[arg(long)]
    format: Vec<String>,

    /// Override the export directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Validate only: do not write reformatted files back
    #[arg(long)]
    check: bool,

    /// Explain a diagnostic kind (e.g. --explain type)
    #[arg(long)]
    explain: Option<String>,
}

const EXPLANATIONS: &[(&str, &str)] = &[
    (
        "type",
        "A type specification could not be compiled: syntax error, unknown \
         referenced type, nil-bearing map key or value, or a record field \
         problem. The column's cells cannot be checked until the spec parses.",
    ),
    (
        "cell",
        "A cell value does not satisfy its declared column type. The cell is \
         reported and skipped; the rest of the file is still processed.",
    ),
    (
        "column",
        "Exploded column names are inconsistent: a gap in array indices, a \
         map key column without its value column, or conflicting paths.",
    ),
    (
        "join",
        "A secondary file could not be joined into its primary: missing or \
         mismatched join column, conflicting column names, or a secondary \
         row whose key matches no primary row.",
    ),
    (
        "validator",
        "A row, file, or package validator expression failed: it returned \
         false or a message, failed to compile, hit a runtime error, or \
         exceeded its step quota.",
    ),
    (
        "loader",
        "A package could not be loaded: missing manifest field, dependency \
         cycle, duplicate file or type name, or a record type that is not \
         compatible with its declared parent.",
    ),
];

fn explain_kind(kind: &str) -> Result<()> {
    match EXPLANATIONS.iter().find(|(k, _)| *k == kind) {
        Some((k, text)) => {
            println!("{k}:\n{text}");
            Ok(())
        }
        None => {
            let known: Vec<&str> = EXPLANATIONS.iter().map(|(k, _)| *k).collect();
            anyhow::bail!("unknown diagnostic kind '{kind}'; known kinds: {}", known.join(", "))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(kind) = &args.explain {
        return explain_kind(kind);
    }

    let config = if args.config.exists() {
        Config::from_file(&args.config).context("Failed to load configuration")?
    } else {
        Config::default()
    };

    let dirs = if args.packages.is_empty() {
        config.packages.paths.clone()
    } else {
        args.packages.clone()
    };
    if dirs.is_empty() {
        anyhow::bail!("no package directories given");
    }

    let formats = if args.format.is_empty() {
        config.output.formats.clone()
    } else {
        args.format.clone()
    };
    let exporters = exporters_for(&formats);

    let export_params = ExportParams {
        export_dir: args.export_dir.unwrap_or_else(|| config.output.dir.clone()),
        format_subdir: None,
        table_sql: TableSql::from_str(&config.output.table_sql).unwrap_or_default(),
    };

    let options = PipelineOptions {
        write_back: config.reformat.write_back && !args.check,
    };

    let mut bad = BadVal::new("tabform");
    let mut pipeline = Pipeline::new(options);
    pipeline
        .run(&mut bad, &dirs, &exporters, &export_params)
        .context("pipeline failed")?;

    let failed = match config.cli.fail_on.as_str() {
        "warning" => bad.errors() > 0 || bad.warnings() > 0,
        _ => bad.errors() > 0,
    };
    if failed {
        eprintln!(
            "{} error(s), {} warning(s)",
            bad.errors(),
            bad.warnings()
        );
        std::process::exit(1);
    }
    Ok(())
}
