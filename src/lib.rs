pub mod catalog;
pub mod cli;
pub mod data;
pub mod error;
pub mod inference;
pub mod io_utils;
pub mod mapping;
pub mod normalize;
pub mod plan;
pub mod source;
pub mod store;
pub mod sync;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, ConnectionArgs, MappingArgs, SourceArgs},
    error::SyncError,
    mapping::ColumnMapping,
    plan::SyncPlan,
    source::Dataset,
    store::{ConnectionConfig, MySqlConfig, Store},
    sync::{SyncOptions, SyncRequest, SyncResult},
    table::TextTable,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_sync", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => handle_preview(&args),
        Commands::Infer(args) => handle_infer(&args),
        Commands::Tables(args) => handle_tables(&args),
        Commands::Describe(args) => handle_describe(&args),
        Commands::Create(args) => handle_create(&args),
        Commands::Sync(args) => handle_sync(&args),
    }
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let dataset = load_source(&args.source)?;
    let rows = dataset.preview(args.rows);
    let shown = rows.len();
    TextTable::with_rows(dataset.headers(), rows).print();
    info!(
        "Displayed {shown} of {} row(s) from {:?}",
        dataset.len(),
        args.source.input
    );
    Ok(())
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let dataset = load_source(&args.source)?;
    let mapping = resolve_mapping(&args.mapping, dataset.headers(), None)?;
    let inferred = inference::infer_schema(&dataset, Some(&mapping));

    let mut table = TextTable::new(["column", "type"]);
    for column in &inferred {
        table.push_row([column.name.clone(), column.storage.to_string()]);
    }
    table.print();

    if let Some(output) = &args.output {
        let mut plan = SyncPlan {
            table: args.table.clone(),
            primary_key: args.primary_key.clone(),
            mapping,
            ..SyncPlan::default()
        };
        plan.record_types(&inferred);
        plan.save(output)
            .with_context(|| format!("Writing sync plan to {output:?}"))?;
        info!(
            "Sync plan with {} column type(s) written to {output:?}",
            plan.column_types.len()
        );
    }
    Ok(())
}

fn handle_tables(args: &cli::TablesArgs) -> Result<()> {
    let mut store = open_store(&args.connection)?;
    let tables = catalog::list_tables(store.as_mut()).context("Listing tables")?;
    for table in &tables {
        println!("{table}");
    }
    info!("Found {} table(s)", tables.len());
    Ok(())
}

fn handle_describe(args: &cli::DescribeArgs) -> Result<()> {
    let mut store = open_store(&args.connection)?;
    let columns = catalog::describe_table(store.as_mut(), &args.table)
        .with_context(|| format!("Describing table '{}'", args.table))?;
    let mut table = TextTable::new(["column", "type", "key", "nullable"]);
    for column in &columns {
        table.push_row([
            column.name.clone(),
            column.data_type.clone(),
            if column.primary_key { "PRI" } else { "" }.to_string(),
            if column.nullable { "YES" } else { "NO" }.to_string(),
        ]);
    }
    table.print();
    Ok(())
}

fn handle_create(args: &cli::CreateArgs) -> Result<()> {
    let dataset = load_source(&args.source)?;
    let mapping = resolve_mapping(&args.mapping, dataset.headers(), None)?;
    let mut plan = SyncPlan::default();
    plan.apply_type_directives(&args.types)?;
    let mut store = open_store(&args.connection)?;
    create_from_source(
        store.as_mut(),
        &dataset,
        &mapping,
        &plan,
        &args.table,
        args.primary_key.as_deref(),
    )
}

fn handle_sync(args: &cli::SyncArgs) -> Result<()> {
    let mut plan = match &args.plan {
        Some(path) => SyncPlan::load(path)?,
        None => SyncPlan::default(),
    };
    plan.apply_type_directives(&args.types)?;

    let dataset = load_source(&args.source)?;
    let table = args
        .table
        .clone()
        .or_else(|| plan.table.clone())
        .ok_or_else(|| anyhow!("A destination table is required (use --table or a plan file)"))?;
    let mapping = resolve_mapping(&args.mapping, dataset.headers(), Some(&plan.mapping))?;
    let primary_key = args.primary_key.clone().or_else(|| plan.primary_key.clone());
    debug!("Mapping {} column(s) into '{table}'", mapping.len());

    let mut store = open_store(&args.connection)?;
    if args.create || plan.create {
        let existing = catalog::list_tables(store.as_mut()).context("Listing tables")?;
        if existing.contains(&table) {
            info!("Table '{table}' already exists; skipping creation");
        } else {
            create_from_source(
                store.as_mut(),
                &dataset,
                &mapping,
                &plan,
                &table,
                primary_key.as_deref(),
            )?;
        }
    }

    let request = SyncRequest {
        table: table.clone(),
        mapping,
        primary_key,
        row_limit: args.limit.or(plan.row_limit),
    };
    let options = SyncOptions {
        default_row_cap: args.default_row_cap,
        max_text_len: args.max_text_len,
    };
    let result = sync::sync(store.as_mut(), &dataset, &request, &options)
        .with_context(|| format!("Synchronizing {:?} into '{table}'", args.source.input))?;
    print_sync_result(&result, args.json)
}

fn create_from_source(
    store: &mut dyn Store,
    dataset: &Dataset,
    mapping: &ColumnMapping,
    plan: &SyncPlan,
    table: &str,
    primary_key: Option<&str>,
) -> Result<()> {
    let inferred = inference::infer_schema(dataset, Some(mapping));
    let definitions = plan.column_definitions(&inferred)?;
    catalog::create_table(store, table, &definitions, primary_key)
        .with_context(|| format!("Creating table '{table}'"))
}

fn print_sync_result(result: &SyncResult, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(result).context("Serializing sync result to JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    let mut summary = TextTable::new(["metric", "value"]);
    for (label, value) in [
        ("total rows", result.total_rows),
        ("inserted", result.inserted),
        ("updated", result.updated),
        ("errors", result.errors),
    ] {
        summary.push_row([label.to_string(), value.to_string()]);
    }
    summary.print();

    if !result.error_messages.is_empty() {
        println!();
        let mut errors = TextTable::new(["error"]);
        for message in &result.error_messages {
            errors.push_row([message.as_str()]);
        }
        errors.print();
    }
    if let Some(note) = &result.note {
        println!();
        println!("Note: {note}");
    }
    Ok(())
}

fn load_source(args: &SourceArgs) -> Result<Dataset> {
    let dataset = source::load_dataset(&args.input, &args.options())
        .with_context(|| format!("Reading source file {:?}", args.input))?;
    dataset
        .validate()
        .with_context(|| format!("Validating source file {:?}", args.input))?;
    Ok(dataset)
}

/// Explicit `--map` directives win, then a planned mapping, then headers
/// mapped onto themselves.
fn resolve_mapping(
    args: &MappingArgs,
    headers: &[String],
    planned: Option<&ColumnMapping>,
) -> Result<ColumnMapping> {
    if !args.map.is_empty() {
        return ColumnMapping::parse_directives(&args.map).context("Parsing --map directives");
    }
    match planned {
        Some(mapping) if !args.auto_map && !mapping.is_empty() => Ok(mapping.clone()),
        _ => Ok(ColumnMapping::identity(headers, args.snake_case)),
    }
}

fn connection_config(args: &ConnectionArgs) -> Result<ConnectionConfig> {
    if let Some(path) = &args.sqlite {
        return Ok(ConnectionConfig::Sqlite(path.clone()));
    }
    let user = args
        .user
        .clone()
        .ok_or_else(|| anyhow!("--user is required for MySQL connections (or use --sqlite)"))?;
    let database = args
        .database
        .clone()
        .ok_or_else(|| anyhow!("--database is required for MySQL connections (or use --sqlite)"))?;
    Ok(ConnectionConfig::MySql(MySqlConfig {
        host: args.host.clone(),
        port: args.port,
        user,
        password: args.password.clone(),
        database,
    }))
}

fn open_store(args: &ConnectionArgs) -> Result<Box<dyn Store>> {
    let config = connection_config(args)?;
    debug!("Connecting to {}", config.describe());
    store::connect(&config)
        .map_err(SyncError::Connectivity)
        .with_context(|| format!("Connecting to {}", config.describe()))
}
