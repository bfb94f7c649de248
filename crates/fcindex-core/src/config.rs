//! Configuration for index construction.
//!
//! [`IndexConfig`] gathers every scalar input of a run plus the ordered list
//! of screening stages. It deserializes from TOML with defaults for every
//! omitted key, and `IndexConfig::default()` reproduces the free cash flow
//! index methodology.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::types::{Field, Flag, ScreeningStage};

/// Default per-component weight cap.
pub const DEFAULT_MAX_WEIGHT: f64 = 0.10;

/// Default numeric tolerance for weight invariants.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Default allocator round limit.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Default floor applied to non-positive sizing values.
pub const DEFAULT_SIZING_FLOOR: f64 = 1e-4;

/// Index identity and base reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexMetadata {
    /// Index display name.
    pub name: String,

    /// Index code.
    pub code: String,

    /// Base date of the index.
    pub base_date: NaiveDate,

    /// Index level on the base date.
    pub base_point: f64,
}

impl Default for IndexMetadata {
    fn default() -> Self {
        Self {
            name: "CNI Free Cash Flow Index".to_string(),
            code: "980092".to_string(),
            base_date: NaiveDate::from_ymd_opt(2012, 12, 31).unwrap_or_default(),
            base_point: 1000.0,
        }
    }
}

/// Component selection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of components in the index.
    pub target_size: usize,

    /// Backup reserve size as a fraction of `target_size`.
    pub backup_fraction: f64,

    /// Metric used to rank the screened universe (descending).
    pub ranking_field: Field,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            target_size: 100,
            backup_fraction: 0.05,
            ranking_field: Field::FcfYield,
        }
    }
}

impl SelectionConfig {
    /// Number of backup records to reserve: `max(1, round(target * fraction))`.
    #[must_use]
    pub fn backup_size(&self) -> usize {
        backup_size(self.target_size, self.backup_fraction)
    }
}

/// Backup reserve size for a target component count.
///
/// `max(1, round(target_size * backup_fraction))`.
#[must_use]
pub fn backup_size(target_size: usize, backup_fraction: f64) -> usize {
    let raw = (target_size as f64 * backup_fraction).round() as usize;
    raw.max(1)
}

/// Numeric parameters of the capped weight allocator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Maximum weight of any single component, in (0, 1].
    pub max_weight: f64,

    /// Tolerance for the sum and cap invariants.
    pub tolerance: f64,

    /// Maximum number of clamp-and-redistribute rounds.
    pub max_iterations: u32,

    /// Non-positive or non-finite sizing values are raised to this floor, or
    /// to the smallest positive sizing value if that is lower. Positive values
    /// are never changed.
    pub sizing_floor: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_weight: DEFAULT_MAX_WEIGHT,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sizing_floor: DEFAULT_SIZING_FLOOR,
        }
    }
}

impl AllocatorConfig {
    /// Creates a config with the given cap and default tolerances.
    #[must_use]
    pub fn with_max_weight(max_weight: f64) -> Self {
        Self {
            max_weight,
            ..Self::default()
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the round limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the sizing floor.
    #[must_use]
    pub fn with_sizing_floor(mut self, floor: f64) -> Self {
        self.sizing_floor = floor;
        self
    }

    /// Validates parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] for an out-of-range parameter.
    pub fn validate(&self) -> IndexResult<()> {
        if !(self.max_weight > 0.0 && self.max_weight <= 1.0) {
            return Err(IndexError::invalid_config(
                "weighting.max_weight",
                format!("must be in (0, 1], got {}", self.max_weight),
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(IndexError::invalid_config(
                "weighting.tolerance",
                format!("must be in (0, 1), got {}", self.tolerance),
            ));
        }
        if self.max_iterations == 0 {
            return Err(IndexError::invalid_config(
                "weighting.max_iterations",
                "must be at least 1",
            ));
        }
        if !(self.sizing_floor > 0.0 && self.sizing_floor.is_finite()) {
            return Err(IndexError::invalid_config(
                "weighting.sizing_floor",
                format!("must be positive, got {}", self.sizing_floor),
            ));
        }
        Ok(())
    }
}

/// Weighting parameters: which metric seeds the weights, and the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    /// Metric used to seed initial weights.
    pub sizing_field: Field,

    /// Allocator parameters.
    #[serde(flatten)]
    pub allocator: AllocatorConfig,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            sizing_field: Field::FreeCashFlow,
            allocator: AllocatorConfig::default(),
        }
    }
}

/// Valuation defaults used by outer surfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Weighted market value on the base date, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_value: Option<f64>,
}

/// Controls record-level parallelism inside screening and selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Enable parallel processing (requires the `parallel` feature).
    pub enabled: bool,

    /// Minimum population size to trigger parallel processing.
    /// Below this threshold, sequential is faster due to thread overhead.
    pub threshold: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1000,
        }
    }
}

impl ParallelConfig {
    /// A config that always runs sequentially.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns true if parallel processing should be used for `count` items.
    #[must_use]
    pub fn should_parallelize(&self, count: usize, feature_enabled: bool) -> bool {
        feature_enabled && self.enabled && count >= self.threshold
    }
}

/// Full configuration of an index construction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index identity and base reference.
    pub index: IndexMetadata,

    /// Selection parameters.
    pub selection: SelectionConfig,

    /// Weighting parameters.
    pub weighting: WeightingConfig,

    /// Valuation defaults.
    pub valuation: ValuationConfig,

    /// Parallelism.
    pub parallel: ParallelConfig,

    /// Screening stages, applied in order.
    pub stages: Vec<ScreeningStage>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index: IndexMetadata::default(),
            selection: SelectionConfig::default(),
            weighting: WeightingConfig::default(),
            valuation: ValuationConfig::default(),
            parallel: ParallelConfig::default(),
            stages: default_stages(),
        }
    }
}

impl IndexConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ConfigLoad`] if the file cannot be read or parsed,
    /// or a validation error.
    pub fn from_file(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexError::config_load(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ConfigLoad`] on a parse failure, or a validation error.
    pub fn from_toml_str(content: &str) -> IndexResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| IndexError::config_load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the config as TOML.
    ///
    /// # Errors
    ///
    /// Fails if a stage holds a programmatic predicate.
    pub fn to_toml_string(&self) -> IndexResult<String> {
        toml::to_string_pretty(self).map_err(|e| IndexError::config_load(e.to_string()))
    }

    /// Sets the component count.
    #[must_use]
    pub fn with_target_size(mut self, target_size: usize) -> Self {
        self.selection.target_size = target_size;
        self
    }

    /// Sets the backup fraction.
    #[must_use]
    pub fn with_backup_fraction(mut self, fraction: f64) -> Self {
        self.selection.backup_fraction = fraction;
        self
    }

    /// Sets the ranking metric.
    #[must_use]
    pub fn with_ranking_field(mut self, field: Field) -> Self {
        self.selection.ranking_field = field;
        self
    }

    /// Sets the sizing metric.
    #[must_use]
    pub fn with_sizing_field(mut self, field: Field) -> Self {
        self.weighting.sizing_field = field;
        self
    }

    /// Sets the weight cap.
    #[must_use]
    pub fn with_max_weight(mut self, max_weight: f64) -> Self {
        self.weighting.allocator.max_weight = max_weight;
        self
    }

    /// Sets the base reference value.
    #[must_use]
    pub fn with_base_value(mut self, base_value: f64) -> Self {
        self.valuation.base_value = Some(base_value);
        self
    }

    /// Replaces the screening stages.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<ScreeningStage>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the parallel configuration.
    #[must_use]
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates every section.
    ///
    /// Feasibility of the cap against the component count is checked by the
    /// allocator, since the component count is only known after selection.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> IndexResult<()> {
        if self.selection.target_size == 0 {
            return Err(IndexError::invalid_config(
                "selection.target_size",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.selection.backup_fraction) {
            return Err(IndexError::invalid_config(
                "selection.backup_fraction",
                format!("must be in [0, 1], got {}", self.selection.backup_fraction),
            ));
        }
        if !(self.index.base_point > 0.0 && self.index.base_point.is_finite()) {
            return Err(IndexError::invalid_config(
                "index.base_point",
                format!("must be positive, got {}", self.index.base_point),
            ));
        }
        if let Some(base) = self.valuation.base_value {
            if base <= 0.0 {
                return Err(IndexError::InvalidValuationBase { value: base });
            }
        }
        self.weighting.allocator.validate()?;
        for stage in &self.stages {
            stage.validate()?;
        }
        Ok(())
    }
}

/// Screening stages of the free cash flow index methodology.
///
/// Basic eligibility first, then liquidity and quality cutoffs, then the
/// cash flow conditions. Each quantile cutoff is taken over the population
/// left by the stages before it.
#[must_use]
pub fn default_stages() -> Vec<ScreeningStage> {
    vec![
        ScreeningStage::exclude_flag("special_treatment", Flag::SpecialTreatment),
        ScreeningStage::minimum("listing_age", Field::ListingMonths, 6.0),
        ScreeningStage::exclude_flag("violation", Flag::Violation),
        ScreeningStage::exclude_flag("loss_making", Flag::LossMaking),
        ScreeningStage::exclude_flag("abnormal_price", Flag::AbnormalPrice),
        ScreeningStage::drop_bottom("turnover_bottom_20pct", Field::Turnover, 0.2),
        ScreeningStage::exclude_industries(
            "financials_and_real_estate",
            ["Banking", "Non-bank Finance", "Real Estate"],
        ),
        ScreeningStage::drop_bottom("roe_stability_bottom_10pct", Field::RoeStability, 0.1),
        ScreeningStage::require_positive("positive_free_cash_flow", Field::FreeCashFlow),
        ScreeningStage::require_positive("positive_enterprise_value", Field::EnterpriseValue),
        ScreeningStage::require_positive("positive_operating_cash_flow", Field::OperatingCashFlow),
        ScreeningStage::drop_bottom("ocf_to_profit_bottom_30pct", Field::OcfToProfit, 0.3),
    ]
}
