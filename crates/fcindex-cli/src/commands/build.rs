//! Build command implementation.
//!
//! Runs the full construction pipeline over a universe snapshot.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use fcindex_construction::{IndexConstructor, IndexRun};
use fcindex_core::IndexConfig;

use crate::cli::OutputFormat;
use crate::commands::{load_universe, parse_date};
use crate::output::{
    format_percent, print_header, print_json, print_table, print_warning, KeyValue,
};

/// Arguments for the build command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Universe snapshot (.json array of records, or flat .csv)
    #[arg(short, long)]
    pub universe: PathBuf,

    /// Index configuration (TOML). Defaults to the built-in methodology.
    #[arg(short, long, env = "FCINDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Valuation date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub as_of: Option<String>,

    /// Weighted market value on the base date
    #[arg(long)]
    pub base_value: Option<f64>,

    /// Override the target component count
    #[arg(long)]
    pub target_size: Option<usize>,

    /// Override the single-component weight cap (fraction, e.g. 0.1)
    #[arg(long)]
    pub max_weight: Option<f64>,

    /// Number of top components to show
    #[arg(long, default_value = "10")]
    pub top: usize,
}

/// One row of the screening audit table.
#[derive(Debug, Serialize, Tabled)]
struct StageRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Before")]
    before: usize,
    #[tabled(rename = "After")]
    after: usize,
    #[tabled(rename = "Removed")]
    removed: usize,
}

/// One row of the industry table.
#[derive(Debug, Serialize, Tabled)]
struct IndustryRow {
    #[tabled(rename = "Industry")]
    industry: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Weight")]
    weight: String,
}

/// One row of the top components table.
#[derive(Debug, Serialize, Tabled)]
struct ComponentRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Industry")]
    industry: String,
    #[tabled(rename = "Initial")]
    initial: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

/// JSON document for a completed run.
#[derive(Serialize)]
struct BuildReport<'r, 'a> {
    #[serde(flatten)]
    run: &'r IndexRun<'a>,
    warnings: Vec<String>,
}

/// Execute the build command.
pub fn execute(args: BuildArgs, format: OutputFormat) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => IndexConfig::from_file(path)?,
        None => IndexConfig::default(),
    };
    if let Some(target_size) = args.target_size {
        config = config.with_target_size(target_size);
    }
    if let Some(max_weight) = args.max_weight {
        config = config.with_max_weight(max_weight);
    }
    if let Some(base_value) = args.base_value {
        config = config.with_base_value(base_value);
    }

    let as_of = match &args.as_of {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };

    let universe = load_universe(&args.universe)?;
    let run = IndexConstructor::new(config).run(&universe, as_of)?;
    let warnings: Vec<String> = run.warnings().iter().map(ToString::to_string).collect();

    match format {
        OutputFormat::Table => {
            print_run(&run, args.top);
            for warning in &warnings {
                print_warning(warning);
            }
        }
        OutputFormat::Json => {
            print_json(&BuildReport {
                run: &run,
                warnings,
            })?;
        }
    }

    Ok(())
}

fn print_run(run: &IndexRun<'_>, top: usize) {
    let valuation = &run.valuation;
    print_header("Index Valuation");
    print_table(&[
        KeyValue::new("As Of", valuation.as_of.to_string()),
        KeyValue::from_f64("Index Value", valuation.index_value, 4),
        KeyValue::from_f64("Base Point", valuation.base_point, 2),
        KeyValue::from_f64("Current Value", valuation.current_value, 2),
        KeyValue::from_f64("Base Value", valuation.base_value, 2),
        KeyValue::from_percent("Change Since Base", valuation.change_since_base()),
    ]);

    print_header("Screening");
    let stages: Vec<StageRow> = run
        .audit
        .stages
        .iter()
        .map(|s| StageRow {
            stage: s.name.clone(),
            before: s.before,
            after: s.after,
            removed: s.removed(),
        })
        .collect();
    print_table(&stages);

    let summary = &run.summary;
    print_header("Components");
    print_table(&[
        KeyValue::new("Components", summary.total_components.to_string()),
        KeyValue::new("Backups", run.selection.backup.len().to_string()),
        KeyValue::from_percent("Max Weight", summary.max_weight),
        KeyValue::from_percent("Min Weight", summary.min_weight),
        KeyValue::from_percent("Avg Weight", summary.avg_weight),
        KeyValue::new("Weights >= 5%", summary.concentration_count.to_string()),
        KeyValue::new("Allocator Rounds", run.allocation.iterations.to_string()),
        KeyValue::new("Converged", run.allocation.converged.to_string()),
    ]);

    print_header("Industry Distribution");
    let industries: Vec<IndustryRow> = run
        .industry_distribution
        .buckets()
        .iter()
        .map(|b| IndustryRow {
            industry: b.industry.clone(),
            count: b.count,
            weight: format_percent(b.weight),
        })
        .collect();
    print_table(&industries);

    print_header(&format!("Top {top} Components"));
    let components = &run.selection.components;
    let rows: Vec<ComponentRow> = run
        .allocation
        .table
        .top(top)
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let record = components.iter().find(|r| r.id == entry.id);
            ComponentRow {
                rank: i + 1,
                id: entry.id.to_string(),
                name: record.map(|r| r.name.clone()).unwrap_or_default(),
                industry: record.map(|r| r.industry.clone()).unwrap_or_default(),
                initial: format_percent(entry.initial_weight),
                weight: format_percent(entry.weight),
            }
        })
        .collect();
    print_table(&rows);
}
