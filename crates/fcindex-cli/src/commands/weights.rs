//! Weights command implementation.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use fcindex_construction::weighting::cap_weights;
use fcindex_core::AllocatorConfig;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output::{format_percent, print_header, print_json, print_table, KeyValue};

/// Arguments for the weights command.
#[derive(Args, Debug)]
pub struct WeightsArgs {
    /// Sizing values, comma separated (e.g. 10,20,30,40)
    #[arg(long, required = true, value_delimiter = ',', allow_negative_numbers = true)]
    pub values: Vec<f64>,

    /// Maximum weight of any single entry (fraction)
    #[arg(short, long, default_value = "0.1")]
    pub max_weight: f64,

    /// Convergence tolerance
    #[arg(long, default_value = "1e-6")]
    pub tolerance: f64,

    /// Maximum clamp-and-redistribute rounds
    #[arg(long, default_value = "100")]
    pub max_iterations: u32,
}

#[derive(Debug, Serialize, Tabled)]
struct WeightRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Sizing")]
    sizing: f64,
    #[tabled(rename = "Initial")]
    initial: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

/// Execute the weights command.
pub fn execute(args: WeightsArgs, format: OutputFormat) -> Result<()> {
    if args.values.is_empty() {
        return Err(CliError::NoValues.into());
    }

    let config = AllocatorConfig::with_max_weight(args.max_weight)
        .with_tolerance(args.tolerance)
        .with_max_iterations(args.max_iterations);
    let result = cap_weights(&args.values, &config)?;

    match format {
        OutputFormat::Table => {
            print_header("Capped Weights");
            let rows: Vec<WeightRow> = args
                .values
                .iter()
                .zip(result.initial.iter().zip(&result.weights))
                .enumerate()
                .map(|(index, (&sizing, (&initial, &weight)))| WeightRow {
                    index,
                    sizing,
                    initial: format_percent(initial),
                    weight: format_percent(weight),
                })
                .collect();
            print_table(&rows);

            print_table(&[
                KeyValue::from_percent("Max Weight", args.max_weight),
                KeyValue::new("Rounds", result.iterations.to_string()),
                KeyValue::new("Converged", result.converged.to_string()),
                KeyValue::new("Equal Fallback", result.equal_fallback.to_string()),
                KeyValue::new("Floored", result.floored.to_string()),
                KeyValue::from_f64("Residual", result.residual, 12),
            ]);
        }
        OutputFormat::Json => print_json(&result)?,
    }

    Ok(())
}
