use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fvr_tools::check::{self, CheckOptions};
use fvr_tools::io::{excel_read, excel_write, json};
use fvr_tools::model::{DEFAULT_METRICS, OCCUPANCY_DATE_COLUMN, SelectedSheets};
use fvr_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "fvr_tools=debug" } else { "fvr_tools=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sheets(args) => execute_sheets(args),
        Command::View(args) => execute_view(args),
        Command::Check(args) => execute_check(args),
    }
}

fn execute_sheets(args: SheetsArgs) -> Result<()> {
    for name in excel_read::list_sheets(&args.input)? {
        println!("{name}");
    }
    Ok(())
}

fn execute_view(args: ViewArgs) -> Result<()> {
    let table = check::view_sheet(&args.input, &args.sheet)?;
    print!("{}", check::render_sheet(&table, args.limit));
    Ok(())
}

fn execute_check(args: CheckArgs) -> Result<()> {
    let selected = SelectedSheets::new(args.sheets);
    if selected.is_empty() {
        return Err(ToolError::EmptySelection);
    }

    let options = CheckOptions {
        metrics: args.metrics,
        date_column: args.date_column,
    };
    let report = check::run_check(&args.input, &selected, &options)?;
    print!("{report}");

    if let Some(path) = &args.xlsx {
        excel_write::write_report(path, &report)?;
    }
    if let Some(path) = &args.json {
        json::write_report(path, &report)?;
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Compare occupancy and revenue across the sheets of an FVR workbook."
)]
struct Cli {
    /// Log debug details to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sheets of a workbook.
    Sheets(SheetsArgs),
    /// Print the contents of one sheet.
    View(ViewArgs),
    /// Compare the selected sheets against the first one.
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct SheetsArgs {
    /// Workbook to inspect (.xlsx).
    #[arg(long)]
    input: PathBuf,
}

#[derive(clap::Args)]
struct ViewArgs {
    /// Workbook to read (.xlsx).
    #[arg(long)]
    input: PathBuf,

    /// Sheet to print.
    #[arg(long)]
    sheet: String,

    /// Maximum number of rows to print.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Workbook to read (.xlsx).
    #[arg(long)]
    input: PathBuf,

    /// Sheets to compare; the first one is the baseline.
    #[arg(long = "sheet", required = true)]
    sheets: Vec<String>,

    /// Metric columns to compare.
    #[arg(long = "metric", default_values_t = DEFAULT_METRICS.map(String::from))]
    metrics: Vec<String>,

    /// Column holding the date of each row.
    #[arg(long, default_value = OCCUPANCY_DATE_COLUMN)]
    date_column: String,

    /// Also write the report to this workbook.
    #[arg(long)]
    xlsx: Option<PathBuf>,

    /// Also write the report to this JSON file.
    #[arg(long)]
    json: Option<PathBuf>,
}
