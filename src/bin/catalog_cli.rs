//! Catalog Command Line Interface
//!
//! Operator tool for inspecting and exporting style/template catalogs.
//!
//! # Usage
//!
//! ```bash
//! # Render a token with positional arguments
//! catalog_cli --catalog styles.catalog render style_card '#3b82f6' '#ffffff'
//!
//! # Variant picked by count under the catalog's plural rule
//! catalog_cli --catalog styles.catalog render tpl_items --count 3 3
//!
//! # Physics of everything a template reaches, as JSON
//! catalog_cli --catalog styles.catalog physics tpl_scene
//!
//! # Lint the catalog (exit 3 on errors)
//! catalog_cli --catalog styles.catalog --lenient check
//!
//! # Compile to a binary snapshot
//! catalog_cli --catalog styles.catalog export styles.mycl
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use mycelia::mycelia_core::inspect::{EXIT_CHECK_FAILED, EXIT_NO_CATALOG};
use mycelia::mycelia_core::{dump, Severity};
use mycelia::{CatalogEngine, EngineConfig, EngineError};

#[derive(Parser)]
#[command(name = "catalog_cli")]
#[command(version = "0.1.0")]
#[command(about = "Inspect, render and export style/template catalogs")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog to load (text or binary snapshot)
    #[arg(long, short = 'c', global = true, env = "MYCELIA_CATALOG")]
    catalog: Option<PathBuf>,

    /// YAML engine configuration (overrides MYCELIA_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip bad entries instead of failing the load
    #[arg(long, global = true)]
    lenient: bool,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a token with positional arguments
    Render {
        /// Token, optionally with a variant: style_card{hover}
        token: String,
        /// Positional arguments %0, %1, ...
        args: Vec<String>,
        /// Pick the variant for this count under the catalog's plural rule
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i64>,
    },

    /// Physics records reachable from a token
    Physics {
        token: String,
        args: Vec<String>,
    },

    /// Write the loaded catalog as a binary snapshot
    Export {
        /// Destination (defaults to MYCELIA_EXPORT)
        path: Option<PathBuf>,
    },

    /// Lint the catalog: skipped entries, placeholder gaps, empty bodies
    Check,

    /// List every definition
    Dump,

    /// Search token, label and body text
    Find { query: String },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            match e.downcast_ref::<EngineError>() {
                Some(EngineError::NoCatalog) => ExitCode::from(EXIT_NO_CATALOG),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::from_env()?,
    };
    if cli.lenient {
        config.strict = false;
    }
    if cli.catalog.is_some() {
        config.catalog_path = cli.catalog.clone();
    }

    let engine = CatalogEngine::new(&config);
    let path = config
        .catalog_path
        .as_deref()
        .ok_or(EngineError::NoCatalog)?;
    let report = engine
        .load_path(path, config.strict)
        .with_context(|| format!("Failed to load catalog {}", path.display()))?;
    for diag in &report.skipped {
        eprintln!("{} {}", "skipped:".yellow(), diag);
    }

    match &cli.command {
        Commands::Render { token, args, count } => {
            cmd_render(&engine, token, args, *count, cli.format)
        }
        Commands::Physics { token, args } => cmd_physics(&engine, token, args, cli.format),
        Commands::Export { path } => {
            let dest = path
                .clone()
                .or_else(|| config.export_path.clone())
                .ok_or_else(|| anyhow!("no export path given and MYCELIA_EXPORT is not set"))?;
            cmd_export(&engine, dest, cli.format)
        }
        Commands::Check => cmd_check(&engine, cli.format),
        Commands::Dump => cmd_dump(&engine, cli.format),
        Commands::Find { query } => cmd_find(&engine, query, cli.format),
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn arg_refs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

fn cmd_render(
    engine: &CatalogEngine,
    token: &str,
    args: &[String],
    count: Option<i64>,
    format: OutputFormat,
) -> Result<u8> {
    let text = match count {
        Some(count) => engine.render_count(token, count, &arg_refs(args))?,
        None => engine.render(token, &arg_refs(args))?,
    };
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "token": token, "output": text });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => println!("{}", text),
    }
    Ok(0)
}

fn cmd_physics(
    engine: &CatalogEngine,
    token: &str,
    args: &[String],
    format: OutputFormat,
) -> Result<u8> {
    let json = engine.physics_json(token, &arg_refs(args))?;
    match format {
        OutputFormat::Pretty => {
            let value: serde_json::Value = serde_json::from_str(&json)?;
            let records = value.as_object().map(|o| o.len()).unwrap_or(0);
            if records == 0 {
                println!("{} {} declares no physics", "--".dimmed(), token);
            } else {
                println!("{} {} record(s)", "OK".green(), records);
            }
            println!("{}", json);
        }
        OutputFormat::Json | OutputFormat::Text => println!("{}", json),
    }
    Ok(0)
}

fn cmd_export(engine: &CatalogEngine, dest: PathBuf, format: OutputFormat) -> Result<u8> {
    let bytes = engine.export_binary(&dest)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "path": dest.display().to_string(), "bytes": bytes })
        ),
        OutputFormat::Text => println!("{}", bytes),
        OutputFormat::Pretty => println!(
            "{} Wrote {} bytes to {}",
            "OK".green(),
            bytes,
            dest.display()
        ),
    }
    Ok(0)
}

fn cmd_check(engine: &CatalogEngine, format: OutputFormat) -> Result<u8> {
    let report = engine.check()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Pretty => {
            for diag in &report.diagnostics {
                let line = diag.to_string();
                let line = match diag.severity {
                    Severity::Error => line.red(),
                    Severity::Warning => line.yellow(),
                    Severity::Info => line.dimmed(),
                };
                println!("{}", line);
            }
            let summary = format!(
                "{} tokens, {} error(s), {} warning(s)",
                report.tokens,
                report.errors().count(),
                report.warnings().count()
            );
            if report.has_errors() {
                println!("{} {}", "FAIL".red().bold(), summary);
            } else {
                println!("{} {}", "OK".green(), summary);
            }
        }
    }
    if report.has_errors() {
        Ok(EXIT_CHECK_FAILED)
    } else {
        Ok(0)
    }
}

fn cmd_dump(engine: &CatalogEngine, format: OutputFormat) -> Result<u8> {
    match format {
        OutputFormat::Json => {
            let snapshot = engine.snapshot()?;
            println!("{}", serde_json::to_string_pretty(&dump(&snapshot.catalog))?);
        }
        OutputFormat::Text | OutputFormat::Pretty => print!("{}", engine.dump_table()?),
    }
    Ok(0)
}

fn cmd_find(engine: &CatalogEngine, query: &str, format: OutputFormat) -> Result<u8> {
    let hits = engine.find(query)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        OutputFormat::Text => hits.iter().for_each(|line| println!("{}", line)),
        OutputFormat::Pretty => {
            if hits.is_empty() {
                println!("{} no match for '{}'", "--".dimmed(), query);
            }
            for line in &hits {
                println!("{}", line);
            }
        }
    }
    Ok(0)
}
