use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use defib_explorer::data::loader::{LoadOptions, SourceFormat};
use defib_explorer::data::store::DatasetStore;
use defib_explorer::report::{self, Summary};
use defib_explorer::state::DashboardState;

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Filter a defibrillator dataset and print counts per category and map
/// coordinates.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Dataset file (.csv, .json or .parquet).
    path: PathBuf,

    /// JSON file with load options (delimiter, null values, fields, renames).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Force the source format instead of using the file extension.
    #[arg(long, value_enum)]
    source_format: Option<SourceFormat>,

    /// Field delimiter of delimited sources.
    #[arg(long)]
    delimiter: Option<char>,

    /// Categorical field used for filtering (repeatable, replaces the defaults).
    #[arg(long = "categorical", value_name = "FIELD")]
    categorical: Vec<String>,

    /// Restrict a field: `FIELD=V1,V2`.  `FIELD=` selects nothing.
    /// Repeating a field adds values to its selection.
    #[arg(long = "filter", value_name = "FIELD=VALUES")]
    filters: Vec<String>,

    /// Leave fields without `--filter` unrestricted instead of selecting
    /// every non-null value.
    #[arg(long)]
    no_default_selection: bool,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Number of matching rows printed in text output.
    #[arg(long, default_value_t = 20)]
    rows: usize,

    /// Write the matching rows to this file as delimited text.
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,
}

fn parse_filter(arg: &str) -> Result<(String, BTreeSet<String>)> {
    let Some((field, values)) = arg.split_once('=') else {
        bail!("filter '{arg}' is not of the form FIELD=V1,V2");
    };
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok((field.trim().to_string(), values))
}

fn load_options(args: &Args) -> Result<LoadOptions> {
    let mut options = match &args.config {
        Some(path) => LoadOptions::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => LoadOptions::default(),
    };
    if let Some(format) = args.source_format {
        options.format = Some(format);
    }
    if let Some(delimiter) = args.delimiter {
        options.delimiter = delimiter;
    }
    if !args.categorical.is_empty() {
        options.categorical_fields = args.categorical.clone();
    }
    Ok(options)
}

fn run(args: Args) -> Result<()> {
    let options = load_options(&args)?;
    let store = DatasetStore::open(&args.path, options.clone());
    let dataset = store
        .load()
        .with_context(|| format!("loading {}", args.path.display()))?;

    let mut state = if args.no_default_selection {
        DashboardState::unrestricted(dataset)
    } else {
        DashboardState::new(dataset)
    };

    let mut explicit = BTreeSet::new();
    for arg in &args.filters {
        let (field, values) = parse_filter(arg)?;
        // the first --filter for a field replaces the default selection
        let mut selection = if explicit.insert(field.clone()) {
            BTreeSet::new()
        } else {
            state.filters.get(&field).cloned().unwrap_or_default()
        };
        selection.extend(values);
        state.set_selection(&field, selection)?;
    }

    let snapshot = state.snapshot()?;
    let summary = Summary::from_snapshot(&snapshot);

    match args.format {
        OutputFormat::Text => {
            print!("{}", summary.to_text());
            if !snapshot.view.is_empty() {
                println!("{}", report::format_table(&snapshot.view, args.rows)?);
            }
        }
        OutputFormat::Json => {
            summary.write_json(io::stdout().lock())?;
            println!();
        }
    }

    if let Some(path) = &args.export {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        report::write_csv(&snapshot.view, BufWriter::new(file), &options)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Exported {} rows to {}", snapshot.view.len(), path.display());
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Args::parse()) {
        log::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
