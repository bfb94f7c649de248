//! CLI command implementations.

pub mod build;
pub mod config;
pub mod weights;

pub use build::BuildArgs;
pub use config::ConfigArgs;
pub use weights::WeightsArgs;

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use fcindex_core::{EligibilityFlags, InstrumentRecord, Universe};

use crate::error::{CliError, CliResult};

/// Parses a date string in YYYY-MM-DD format.
pub fn parse_date(s: &str) -> CliResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

/// Loads a universe snapshot from a `.json` or `.csv` file.
///
/// JSON is an array of records; CSV has one flat row per record.
pub fn load_universe(path: &Path) -> CliResult<Universe> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let parse_error = |reason: String| CliError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let records = match extension.as_deref() {
        Some("json") => {
            let file = File::open(path)?;
            serde_json::from_reader::<_, Vec<InstrumentRecord>>(file)
                .map_err(|e| parse_error(e.to_string()))?
        }
        Some("csv") => {
            let mut reader = csv::Reader::from_path(path).map_err(|e| parse_error(e.to_string()))?;
            let mut records = Vec::new();
            for row in reader.deserialize::<CsvRow>() {
                let row = row.map_err(|e| parse_error(e.to_string()))?;
                records.push(row.into_record()?);
            }
            records
        }
        _ => return Err(CliError::UnsupportedFormat(path.to_path_buf())),
    };

    tracing::info!(path = %path.display(), records = records.len(), "universe loaded");
    Ok(Universe::new(records)?)
}

/// One flat CSV row of a universe snapshot.
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    industry: String,
    #[serde(default)]
    market_cap: Option<f64>,
    price: f64,
    shares: f64,
    #[serde(default)]
    turnover: f64,
    #[serde(default)]
    free_cash_flow: f64,
    #[serde(default)]
    enterprise_value: f64,
    #[serde(default)]
    operating_cash_flow: f64,
    #[serde(default)]
    operating_profit: f64,
    #[serde(default)]
    listing_months: u32,
    #[serde(default)]
    roe_stability: Option<f64>,
    #[serde(default)]
    special_treatment: bool,
    #[serde(default)]
    violation: bool,
    #[serde(default)]
    loss_making: bool,
    #[serde(default)]
    abnormal_price: bool,
}

impl CsvRow {
    fn into_record(self) -> CliResult<InstrumentRecord> {
        let mut builder = InstrumentRecord::builder()
            .id(self.id)
            .industry(self.industry)
            .price(self.price)
            .shares(self.shares)
            .turnover(self.turnover)
            .free_cash_flow(self.free_cash_flow)
            .enterprise_value(self.enterprise_value)
            .operating_cash_flow(self.operating_cash_flow)
            .operating_profit(self.operating_profit)
            .listing_months(self.listing_months)
            .flags(EligibilityFlags {
                special_treatment: self.special_treatment,
                violation: self.violation,
                loss_making: self.loss_making,
                abnormal_price: self.abnormal_price,
            });
        if let Some(name) = self.name.filter(|n| !n.is_empty()) {
            builder = builder.name(name);
        }
        if let Some(market_cap) = self.market_cap {
            builder = builder.market_cap(market_cap);
        }
        if let Some(score) = self.roe_stability {
            builder = builder.roe_stability(score);
        }
        Ok(builder.build()?)
    }
}
