//! Ordered eligibility screening.
//!
//! Stages run strictly in declaration order. Quantile cutoffs are computed
//! over the population that survived the previous stages, so reordering
//! stages changes the result.

use serde::Serialize;
use tracing::{debug, info};

use fcindex_core::stats::quantile;
use fcindex_core::{
    CutoffSide, Field, IndexResult, InstrumentRecord, ParallelConfig, ScreeningStage, StageRule,
};

use crate::parallel::{maybe_parallel_filter, maybe_parallel_map};

/// Population size after one screening stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    /// Stage name.
    pub name: String,
    /// Population entering the stage.
    pub before: usize,
    /// Population leaving the stage.
    pub after: usize,
    /// Cutoff value used by a quantile stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// True when a quantile stage had too few records to run.
    pub skipped: bool,
}

impl StageOutcome {
    /// Number of records the stage removed.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// Audit trail of a screening run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreeningAudit {
    /// Size of the input universe.
    pub initial: usize,
    /// One entry per stage, in application order.
    pub stages: Vec<StageOutcome>,
}

impl ScreeningAudit {
    /// Population size after the last stage.
    #[must_use]
    pub fn final_size(&self) -> usize {
        self.stages.last().map_or(self.initial, |s| s.after)
    }

    /// Name of the first stage that left the population empty.
    #[must_use]
    pub fn emptied_at(&self) -> Option<&str> {
        if self.initial == 0 {
            return Some("input");
        }
        self.stages
            .iter()
            .find(|s| s.after == 0)
            .map(|s| s.name.as_str())
    }
}

/// Records that survived screening, plus the audit trail.
///
/// Records are borrowed from the input universe.
#[derive(Debug, Clone, Serialize)]
pub struct Screening<'a> {
    /// Surviving records in input order.
    pub records: Vec<&'a InstrumentRecord>,
    /// Per-stage population sizes.
    pub audit: ScreeningAudit,
}

impl Screening<'_> {
    /// Returns true if no record survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// An ordered list of screening stages.
#[derive(Debug, Clone, Default)]
pub struct ScreeningPipeline {
    stages: Vec<ScreeningStage>,
    parallel: ParallelConfig,
}

impl ScreeningPipeline {
    /// Creates a pipeline over `stages`, applied in the given order.
    #[must_use]
    pub fn new(stages: Vec<ScreeningStage>) -> Self {
        Self {
            stages,
            parallel: ParallelConfig::default(),
        }
    }

    /// Sets the parallelism config used for record-level evaluation.
    #[must_use]
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the stages.
    #[must_use]
    pub fn stages(&self) -> &[ScreeningStage] {
        &self.stages
    }

    /// Applies every stage in order.
    ///
    /// An empty result is not an error here; the selector classifies it.
    ///
    /// # Errors
    ///
    /// Returns [`fcindex_core::IndexError::InvalidConfig`] if any stage has
    /// invalid parameters. No stage is applied in that case.
    pub fn run<'a>(&self, universe: &'a [InstrumentRecord]) -> IndexResult<Screening<'a>> {
        for stage in &self.stages {
            stage.validate()?;
        }

        let mut population: Vec<&'a InstrumentRecord> = universe.iter().collect();
        let mut audit = ScreeningAudit {
            initial: population.len(),
            stages: Vec::with_capacity(self.stages.len()),
        };

        for stage in &self.stages {
            let before = population.len();
            let (next, threshold, skipped) = self.apply(stage, &population);
            population = next;

            debug!(
                stage = %stage.name,
                before,
                after = population.len(),
                threshold,
                skipped,
                "screening stage applied"
            );
            audit.stages.push(StageOutcome {
                name: stage.name.clone(),
                before,
                after: population.len(),
                threshold,
                skipped,
            });
        }

        info!(
            initial = audit.initial,
            remaining = population.len(),
            stages = self.stages.len(),
            "screening complete"
        );

        Ok(Screening {
            records: population,
            audit,
        })
    }

    fn apply<'a>(
        &self,
        stage: &ScreeningStage,
        population: &[&'a InstrumentRecord],
    ) -> (Vec<&'a InstrumentRecord>, Option<f64>, bool) {
        if stage.rule.is_population_relative() && population.len() < 2 {
            return (population.to_vec(), None, true);
        }
        match &stage.rule {
            StageRule::QuantileCutoff {
                field,
                fraction,
                side,
            } => {
                let (kept, threshold) =
                    self.quantile_cutoff(population, field, *fraction, *side);
                (kept, threshold, false)
            }
            rule => {
                let kept = maybe_parallel_filter(population, &self.parallel, |record| {
                    rule.keeps(record).unwrap_or(true)
                });
                (kept, None, false)
            }
        }
    }

    fn quantile_cutoff<'a>(
        &self,
        population: &[&'a InstrumentRecord],
        field: &Field,
        fraction: f64,
        side: CutoffSide,
    ) -> (Vec<&'a InstrumentRecord>, Option<f64>) {
        let values = maybe_parallel_map(population, &self.parallel, |record| field.value(record));
        let present: Vec<f64> = values.iter().flatten().copied().collect();

        let p = match side {
            CutoffSide::Bottom => fraction,
            CutoffSide::Top => 1.0 - fraction,
        };
        let Some(threshold) = quantile(&present, p) else {
            // Nobody carries the field.
            return (Vec::new(), None);
        };

        let kept = population
            .iter()
            .zip(&values)
            .filter_map(|(record, value)| match (side, value) {
                (CutoffSide::Bottom, Some(v)) if *v >= threshold => Some(*record),
                (CutoffSide::Top, Some(v)) if *v <= threshold => Some(*record),
                _ => None,
            })
            .collect();
        (kept, Some(threshold))
    }
}

/// Applies `stages` to `universe` in order with the default parallelism.
///
/// # Errors
///
/// Returns [`fcindex_core::IndexError::InvalidConfig`] for an invalid stage.
pub fn screen<'a>(
    universe: &'a [InstrumentRecord],
    stages: &[ScreeningStage],
) -> IndexResult<Screening<'a>> {
    ScreeningPipeline::new(stages.to_vec()).run(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fcindex_core::{EligibilityFlags, Flag, IndexError};

    fn record(id: &str, turnover: f64, fcf: f64) -> InstrumentRecord {
        InstrumentRecord::builder()
            .id(id)
            .industry("Industrials")
            .price(10.0)
            .shares(1000.0)
            .turnover(turnover)
            .free_cash_flow(fcf)
            .build()
            .unwrap()
    }

    fn ids(screening: &Screening<'_>) -> Vec<String> {
        screening.records.iter().map(|r| r.id.to_string()).collect()
    }

    #[test]
    fn test_bottom_quantile_drops_strictly_below() {
        let universe: Vec<_> = (1..=5)
            .map(|i| record(&format!("R{i}"), f64::from(i), 1.0))
            .collect();
        let stages = [ScreeningStage::drop_bottom("turnover", Field::Turnover, 0.2)];

        let result = screen(&universe, &stages).unwrap();
        assert_eq!(ids(&result), vec!["R2", "R3", "R4", "R5"]);
        assert_relative_eq!(result.audit.stages[0].threshold.unwrap(), 1.8, epsilon = 1e-12);
    }

    #[test]
    fn test_top_quantile_drops_strictly_above() {
        let universe: Vec<_> = (1..=5)
            .map(|i| record(&format!("R{i}"), f64::from(i), 1.0))
            .collect();
        let stages = [ScreeningStage::drop_top("turnover", Field::Turnover, 0.2)];

        let result = screen(&universe, &stages).unwrap();
        assert_eq!(ids(&result), vec!["R1", "R2", "R3", "R4"]);
    }

    #[test]
    fn test_quantile_noop_below_two_records() {
        let universe = vec![record("A", 1.0, 1.0)];
        let stages = [ScreeningStage::drop_bottom("turnover", Field::Turnover, 0.5)];

        let result = screen(&universe, &stages).unwrap();
        assert_eq!(result.records.len(), 1);
        assert!(result.audit.stages[0].skipped);
    }

    #[test]
    fn test_record_rule_applies_to_single_record() {
        let universe = vec![record("A", 1.0, -1.0)];
        let stages = [ScreeningStage::require_positive("fcf", Field::FreeCashFlow)];

        let result = screen(&universe, &stages).unwrap();
        assert!(result.is_empty());
        assert!(!result.audit.stages[0].skipped);
        assert_eq!(result.audit.stages[0].removed(), 1);
    }

    #[test]
    fn test_quantile_drops_missing_field() {
        let mut universe: Vec<_> = (1..=4)
            .map(|i| {
                let mut r = record(&format!("R{i}"), 1.0, 1.0);
                r.roe_stability = Some(f64::from(i) / 10.0);
                r
            })
            .collect();
        universe[3].roe_stability = None;

        let stages = [ScreeningStage::drop_bottom("roe", Field::RoeStability, 0.0)];
        let result = screen(&universe, &stages).unwrap();
        assert_eq!(ids(&result), vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn test_stage_order_matters() {
        // R1..R4 have turnover 1..4; R3 and R4 burn cash.
        let universe = vec![
            record("R1", 1.0, 5.0),
            record("R2", 2.0, 5.0),
            record("R3", 3.0, -5.0),
            record("R4", 4.0, -5.0),
        ];
        let quantile = ScreeningStage::drop_bottom("turnover", Field::Turnover, 0.5);
        let positive = ScreeningStage::require_positive("fcf", Field::FreeCashFlow);

        let quantile_first = screen(&universe, &[quantile.clone(), positive.clone()]).unwrap();
        let positive_first = screen(&universe, &[positive, quantile]).unwrap();

        assert!(quantile_first.records.is_empty());
        assert_eq!(ids(&positive_first), vec!["R2"]);
    }

    #[test]
    fn test_empty_population_is_not_an_error() {
        let universe = vec![record("A", 1.0, -1.0), record("B", 2.0, -2.0)];
        let stages = [
            ScreeningStage::require_positive("fcf", Field::FreeCashFlow),
            ScreeningStage::drop_bottom("turnover", Field::Turnover, 0.2),
        ];

        let result = screen(&universe, &stages).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.audit.stages.len(), 2);
        assert_eq!(result.audit.emptied_at(), Some("fcf"));
        assert_eq!(result.audit.final_size(), 0);
    }

    #[test]
    fn test_audit_trail() {
        let flagged = EligibilityFlags {
            special_treatment: true,
            ..EligibilityFlags::default()
        };
        let mut st = record("ST", 5.0, 1.0);
        st.flags = flagged;
        let universe = vec![st, record("A", 1.0, 1.0), record("B", 2.0, 1.0)];
        let stages = [
            ScreeningStage::exclude_flag("st", Flag::SpecialTreatment),
            ScreeningStage::keep_if("named_a", |r| r.id.as_str() == "A"),
        ];

        let result = screen(&universe, &stages).unwrap();
        let audit = &result.audit;
        assert_eq!(audit.initial, 3);
        assert_eq!(audit.stages[0].name, "st");
        assert_eq!((audit.stages[0].before, audit.stages[0].after), (3, 2));
        assert_eq!(audit.stages[1].removed(), 1);
        assert_eq!(ids(&result), vec!["A"]);
    }

    #[test]
    fn test_invalid_stage_rejected() {
        let universe = vec![record("A", 1.0, 1.0)];
        let stages = [ScreeningStage::drop_bottom("bad", Field::Turnover, 1.0)];
        assert!(matches!(
            screen(&universe, &stages),
            Err(IndexError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_parallel_config_gives_same_result() {
        let universe: Vec<_> = (0..300)
            .map(|i| record(&format!("R{i:03}"), f64::from((i * 37) % 101), f64::from(i % 7) - 2.0))
            .collect();
        let stages = vec![
            ScreeningStage::require_positive("fcf", Field::FreeCashFlow),
            ScreeningStage::drop_bottom("turnover", Field::Turnover, 0.2),
        ];

        let sequential = ScreeningPipeline::new(stages.clone())
            .with_parallel(ParallelConfig::sequential())
            .run(&universe)
            .unwrap();
        let parallel = ScreeningPipeline::new(stages)
            .with_parallel(ParallelConfig::default().with_threshold(1))
            .run(&universe)
            .unwrap();

        assert_eq!(ids(&sequential), ids(&parallel));
        assert_eq!(sequential.audit, parallel.audit);
    }
}
