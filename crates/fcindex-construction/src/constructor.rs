//! End-to-end index construction.
//!
//! Runs screening, selection, allocation and valuation in order. A fatal
//! condition at any step aborts the run; non-fatal conditions are collected
//! on the returned [`IndexRun`].

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use fcindex_core::{IndexConfig, IndexError, IndexResult, Universe};

use crate::report::{ComponentSummary, IndustryDistribution};
use crate::screening::{ScreeningAudit, ScreeningPipeline};
use crate::selection::{ComponentSelector, Selection, SizeShortfall};
use crate::valuation::{self, IndexValuation};
use crate::weighting::{self, Allocation, AllocationWarning};

/// A non-fatal condition raised during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RunWarning {
    /// Fewer eligible records than the target size.
    Selection {
        /// Requested and available counts.
        shortfall: SizeShortfall,
    },
    /// An allocator annotation.
    Allocation {
        /// The annotation.
        warning: AllocationWarning,
    },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selection { shortfall } => write!(
                f,
                "only {} of {} requested components available",
                shortfall.available, shortfall.requested
            ),
            Self::Allocation { warning } => write!(f, "{warning}"),
        }
    }
}

/// Everything produced by one construction run.
///
/// Component and backup records are borrowed from the input universe.
#[derive(Debug, Clone, Serialize)]
pub struct IndexRun<'a> {
    /// Population size after each screening stage.
    pub audit: ScreeningAudit,
    /// Components, backups and any size shortfall.
    pub selection: Selection<'a>,
    /// Capped weights.
    pub allocation: Allocation,
    /// Index level.
    pub valuation: IndexValuation,
    /// Weight statistics.
    pub summary: ComponentSummary,
    /// Weight by industry.
    pub industry_distribution: IndustryDistribution,
}

impl IndexRun<'_> {
    /// Non-fatal conditions from every step, in pipeline order.
    #[must_use]
    pub fn warnings(&self) -> Vec<RunWarning> {
        let shortfall = self
            .selection
            .shortfall
            .map(|shortfall| RunWarning::Selection { shortfall });
        shortfall
            .into_iter()
            .chain(
                self.allocation
                    .warnings
                    .iter()
                    .cloned()
                    .map(|warning| RunWarning::Allocation { warning }),
            )
            .collect()
    }
}

/// Builds an index from a universe snapshot according to an [`IndexConfig`].
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use fcindex_construction::IndexConstructor;
/// use fcindex_core::{IndexConfig, InstrumentRecord, Universe};
///
/// let records = (1..=4)
///     .map(|i| {
///         InstrumentRecord::builder()
///             .id(format!("S{i}"))
///             .price(10.0)
///             .shares(1000.0)
///             .free_cash_flow(f64::from(i))
///             .enterprise_value(100.0)
///             .build()
///     })
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
/// let universe = Universe::new(records).unwrap();
///
/// let config = IndexConfig::default()
///     .with_stages(Vec::new())
///     .with_target_size(4)
///     .with_max_weight(0.3);
/// let as_of = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
///
/// let run = IndexConstructor::new(config).run(&universe, as_of).unwrap();
/// assert_eq!(run.selection.components.len(), 4);
/// assert!((run.allocation.table.total() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexConstructor {
    config: IndexConfig,
}

impl IndexConstructor {
    /// Creates a constructor.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Runs the full pipeline.
    ///
    /// Without a configured base value the run anchors its own base: the
    /// current weighted value becomes the base and the index sits at the
    /// base point.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`IndexError`]: an invalid config, an empty
    /// screened universe, an infeasible cap, a cap violation, or an invalid
    /// valuation base.
    pub fn run<'a>(&self, universe: &'a Universe, as_of: NaiveDate) -> IndexResult<IndexRun<'a>> {
        let config = &self.config;
        config.validate()?;

        let screening = ScreeningPipeline::new(config.stages.clone())
            .with_parallel(config.parallel)
            .run(universe.records())?;
        if screening.is_empty() {
            let stage = screening.audit.emptied_at().unwrap_or("screening");
            return Err(IndexError::empty_universe(stage));
        }

        let selection = ComponentSelector::from_config(&config.selection)
            .with_parallel(config.parallel)
            .select(&screening.records)?;

        let allocation = weighting::allocate(
            selection.components.records(),
            &config.weighting.sizing_field,
            &config.weighting.allocator,
        )?;

        let current = valuation::weighted_market_value(&selection.components, &allocation.table)?;
        let base_value = match config.valuation.base_value {
            Some(base) => base,
            None => {
                info!(current, "no base value configured, anchoring base to this run");
                current
            }
        };
        let valuation = valuation::value(
            &selection.components,
            &allocation.table,
            base_value,
            config.index.base_point,
            as_of,
        )?;

        let summary = ComponentSummary::from_table(&allocation.table);
        let industry_distribution =
            IndustryDistribution::from_components(&selection.components, &allocation.table);

        info!(
            index = %config.index.code,
            %as_of,
            components = summary.total_components,
            index_value = valuation.index_value,
            "index run complete"
        );

        Ok(IndexRun {
            audit: screening.audit,
            selection,
            allocation,
            valuation,
            summary,
            industry_distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fcindex_core::{Field, InstrumentRecord, ScreeningStage};

    fn universe(n: usize) -> Universe {
        let records = (0..n)
            .map(|i| {
                InstrumentRecord::builder()
                    .id(format!("S{i:03}"))
                    .industry(if i % 2 == 0 { "Energy" } else { "Materials" })
                    .price(10.0)
                    .shares(1000.0)
                    .free_cash_flow(1.0 + i as f64)
                    .enterprise_value(100.0)
                    .build()
                    .unwrap()
            })
            .collect();
        Universe::new(records).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[test]
    fn test_run_without_base_anchors_to_base_point() {
        let config = IndexConfig::default()
            .with_stages(Vec::new())
            .with_target_size(20);
        let universe = universe(30);

        let run = IndexConstructor::new(config).run(&universe, date()).unwrap();
        assert_eq!(run.selection.components.len(), 20);
        assert_eq!(run.selection.backup.len(), 1);
        assert_relative_eq!(run.valuation.index_value, 1000.0, epsilon = 1e-9);
        assert!(run.warnings().is_empty());
        assert_eq!(run.summary.total_components, 20);
        assert_eq!(run.industry_distribution.len(), 2);
    }

    #[test]
    fn test_run_with_base_value() {
        let config = IndexConfig::default()
            .with_stages(Vec::new())
            .with_target_size(10)
            .with_base_value(5_000.0);
        let universe = universe(10);

        let run = IndexConstructor::new(config).run(&universe, date()).unwrap();
        // Every component is worth 10_000, so the weighted value is 10_000.
        assert_relative_eq!(run.valuation.current_value, 10_000.0, epsilon = 1e-6);
        assert_relative_eq!(run.valuation.index_value, 2_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shortfall_is_a_warning() {
        let config = IndexConfig::default()
            .with_stages(Vec::new())
            .with_target_size(20)
            .with_max_weight(0.2);
        let universe = universe(12);

        let run = IndexConstructor::new(config).run(&universe, date()).unwrap();
        let warnings = run.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            RunWarning::Selection {
                shortfall: SizeShortfall {
                    requested: 20,
                    available: 12
                }
            }
        ));
        assert!(warnings[0].to_string().contains("12 of 20"));
    }

    #[test]
    fn test_non_convergence_reaches_run_warnings() {
        let records = [50.0, 30.0, 10.0, 5.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, &fcf)| {
                InstrumentRecord::builder()
                    .id(format!("S{i}"))
                    .price(10.0)
                    .shares(1000.0)
                    .free_cash_flow(fcf)
                    .enterprise_value(100.0)
                    .build()
                    .unwrap()
            })
            .collect();
        let universe = Universe::new(records).unwrap();
        let mut config = IndexConfig::default()
            .with_stages(Vec::new())
            .with_target_size(5)
            .with_max_weight(0.35);
        config.weighting.allocator.max_iterations = 2;

        let run = IndexConstructor::new(config).run(&universe, date()).unwrap();
        let warnings = run.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            RunWarning::Allocation {
                warning: AllocationWarning::NonConvergence { iterations: 2, .. }
            }
        ));
        assert!(warnings[0].to_string().contains("did not converge"));
    }

    #[test]
    fn test_empty_screen_names_stage() {
        let config = IndexConfig::default().with_stages(vec![ScreeningStage::minimum(
            "huge_caps",
            Field::MarketCap,
            1e15,
        )]);
        let err = IndexConstructor::new(config)
            .run(&universe(5), date())
            .unwrap_err();
        assert_eq!(err, IndexError::empty_universe("huge_caps"));
    }

    #[test]
    fn test_infeasible_cap_aborts() {
        let config = IndexConfig::default().with_stages(Vec::new());
        let err = IndexConstructor::new(config)
            .run(&universe(5), date())
            .unwrap_err();
        assert!(matches!(err, IndexError::ConfigurationInfeasible { count: 5, .. }));
    }

    #[test]
    fn test_invalid_config_rejected_before_running() {
        let config = IndexConfig::default().with_target_size(0);
        assert!(matches!(
            IndexConstructor::new(config).run(&universe(5), date()),
            Err(IndexError::InvalidConfig { .. })
        ));
    }
}
