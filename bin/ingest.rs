use anyhow::{bail, Context};
use clap::{Arg, ArgAction, Command};
use inventory_ingest::{
    charset_for_label, export_csv, export_json, reader_from_path, IngestConfig, MemoryStore,
    Pipeline, SchemaDefinition, TableStore,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn schema_from_arg(arg: &str) -> anyhow::Result<Option<SchemaDefinition>> {
    Ok(match arg {
        "auto" => None,
        "current-stock" => Some(SchemaDefinition::current_stock()),
        "physical-count" => Some(SchemaDefinition::physical_count()),
        file => Some(
            SchemaDefinition::load(Path::new(file))
                .with_context(|| format!("loading schema from {file}"))?,
        ),
    })
}

/// Ask on the terminal before wiping the destination.
fn confirm_clear(table: &str, category: Option<&str>) -> anyhow::Result<bool> {
    let scope = match category {
        Some(c) => format!("all `{c}` rows in `{table}`"),
        None => format!("ALL rows in `{table}`"),
    };
    print!("This deletes {scope} before loading. Continue? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("ingest")
        .about("Clean an inventory CSV and reload it into the inventory table")
        .arg(
            Arg::new("path")
                .long("path")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file (default: config/ingest.toml)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .help("current-stock, physical-count, auto, or a schema TOML file")
                .default_value("auto"),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .help("Only load, and only replace, rows of this category"),
        )
        .arg(
            Arg::new("charset")
                .long("charset")
                .help("Input charset label, e.g. windows-1252")
                .default_value("utf-8"),
        )
        .arg(
            Arg::new("yes")
                .long("yes")
                .short('y')
                .help("Clear the destination without asking")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Load into an in-memory table instead of the hosted store")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("export-json")
                .long("export-json")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("export-csv")
                .long("export-csv")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    let path = matches
        .get_one::<PathBuf>("path")
        .context("--path is required")?;
    if !path.exists() {
        bail!("input file {} does not exist", path.display());
    }

    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let config = IngestConfig::load(config_path)?;
    let dry_run = matches.get_flag("dry-run");
    let store: Box<dyn TableStore> = if dry_run {
        tracing::info!("dry run, writing to an in-memory table");
        Box::new(MemoryStore::new())
    } else {
        Box::new(config.store.rest_store()?)
    };

    let charset = charset_for_label(
        matches
            .get_one::<String>("charset")
            .map(String::as_str)
            .unwrap_or("utf-8"),
    )?;
    let schema = schema_from_arg(
        matches
            .get_one::<String>("schema")
            .map(String::as_str)
            .unwrap_or("auto"),
    )?;

    let mut options = config.pipeline_options()?;
    options.category = matches.get_one::<String>("category").cloned();
    options.confirmed = dry_run
        || matches.get_flag("yes")
        || confirm_clear(&options.table, options.category.as_deref())?;
    if !options.confirmed {
        println!("Aborted, nothing was changed.");
        return Ok(());
    }

    let (reader, meta) = reader_from_path(path, charset).await?;
    let mut pipeline = Pipeline::new(&*store, options);
    if let Some(schema) = schema {
        pipeline = pipeline.with_schema(schema);
    }
    let output = pipeline.run(reader, &meta.name_hint).await?;

    println!("{}", output.report);

    if let Some(json_path) = matches.get_one::<PathBuf>("export-json") {
        export_json(json_path, &output.records).await?;
        tracing::info!(path = %json_path.display(), "wrote JSON export");
    }
    if let Some(csv_path) = matches.get_one::<PathBuf>("export-csv") {
        export_csv(csv_path, &output.records).await?;
        tracing::info!(path = %csv_path.display(), "wrote CSV export");
    }
    Ok(())
}
