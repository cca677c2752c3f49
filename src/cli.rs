use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    normalize::DEFAULT_MAX_TEXT_LEN, source::DEFAULT_PREVIEW_ROWS, source::SourceOptions,
    store::DEFAULT_MYSQL_PORT, sync::DEFAULT_ROW_CAP,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Synchronize spreadsheet rows into relational tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Preview the first rows of a workbook or delimited file
    Preview(PreviewArgs),
    /// Infer SQL column types for a source file, optionally writing a sync plan
    Infer(InferArgs),
    /// List the tables of the destination database
    Tables(TablesArgs),
    /// Describe the columns of a destination table
    Describe(DescribeArgs),
    /// Create a destination table from the inferred types of a source file
    Create(CreateArgs),
    /// Insert or update source rows in a destination table
    Sync(SyncArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Workbook (.xlsx, .xlsm, .xlsb, .xls, .ods) or delimited file (.csv, .tsv, .txt)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Worksheet to read (defaults to the first one)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Delimiter for text sources (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text sources (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl SourceArgs {
    pub fn options(&self) -> SourceOptions {
        SourceOptions {
            sheet: self.sheet.clone(),
            delimiter: self.delimiter,
            encoding: self.input_encoding.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Column mapping `source=target`; a target of `ignore` drops the column
    #[arg(long = "map", value_name = "SOURCE=TARGET", action = clap::ArgAction::Append)]
    pub map: Vec<String>,
    /// Map every source header to a column of the same name
    #[arg(long = "auto-map", conflicts_with = "map")]
    pub auto_map: bool,
    /// Convert automatically mapped column names to snake_case
    #[arg(long = "snake-case")]
    pub snake_case: bool,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// SQLite database file to use instead of a MySQL server
    #[arg(long, conflicts_with_all = ["user", "database"])]
    pub sqlite: Option<PathBuf>,
    /// MySQL host
    #[arg(long, default_value = "localhost")]
    pub host: String,
    /// MySQL port
    #[arg(long, default_value_t = DEFAULT_MYSQL_PORT)]
    pub port: u16,
    /// MySQL user
    #[arg(long)]
    pub user: Option<String>,
    /// MySQL password
    #[arg(long, env = "SHEET_SYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// MySQL database
    #[arg(long)]
    pub database: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Write a sync plan with the mapping and inferred types to this YAML file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Target table recorded in the written plan
    #[arg(long)]
    pub table: Option<String>,
    /// Primary key recorded in the written plan
    #[arg(long = "primary-key")]
    pub primary_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Table to describe
    #[arg(long)]
    pub table: String,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// Table to create
    #[arg(long)]
    pub table: String,
    /// Override an inferred type with `column=SQL_TYPE`
    #[arg(long = "type", value_name = "COLUMN=SQL_TYPE", action = clap::ArgAction::Append)]
    pub types: Vec<String>,
    /// Column to declare as the primary key
    #[arg(long = "primary-key")]
    pub primary_key: Option<String>,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub mapping: MappingArgs,
    /// YAML sync plan; command-line flags override its values
    #[arg(long)]
    pub plan: Option<PathBuf>,
    /// Destination table
    #[arg(long)]
    pub table: Option<String>,
    /// Key column used to match existing rows (discovered when omitted)
    #[arg(long = "primary-key")]
    pub primary_key: Option<String>,
    /// Maximum number of rows to process (0 processes every row)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Create the table from inferred types when it does not exist
    #[arg(long)]
    pub create: bool,
    /// Override an inferred type with `column=SQL_TYPE` when creating
    #[arg(long = "type", value_name = "COLUMN=SQL_TYPE", action = clap::ArgAction::Append)]
    pub types: Vec<String>,
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
    /// Rows processed when no limit is given and the source is larger
    #[arg(long = "default-row-cap", default_value_t = DEFAULT_ROW_CAP)]
    pub default_row_cap: usize,
    /// Maximum characters kept from a text value
    #[arg(long = "max-text-len", default_value_t = DEFAULT_MAX_TEXT_LEN)]
    pub max_text_len: usize,
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
