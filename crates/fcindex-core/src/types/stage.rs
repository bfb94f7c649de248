//! Declarative screening stage definitions.
//!
//! A stage only describes *what* to exclude. Applying stages in order is the
//! job of the screening pipeline in `fcindex-construction`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Field, Flag, InstrumentRecord};
use crate::error::{IndexError, IndexResult};

/// Which end of a ranked population a quantile cutoff removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffSide {
    /// Drop the lowest values.
    #[default]
    Bottom,
    /// Drop the highest values.
    Top,
}

/// A programmatic keep-predicate.
///
/// Records for which the predicate returns `true` survive the stage.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&InstrumentRecord) -> bool + Send + Sync>);

impl Predicate {
    /// Wraps a closure as a predicate.
    pub fn new(f: impl Fn(&InstrumentRecord) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn keeps(&self, record: &InstrumentRecord) -> bool {
        (self.0)(record)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// The exclusion rule of a screening stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum StageRule {
    /// Drop records with the flag set.
    ExcludeFlag {
        /// Flag to test.
        flag: Flag,
    },

    /// Drop records whose field is not strictly positive (or missing).
    RequirePositive {
        /// Field to test.
        field: Field,
    },

    /// Drop records whose field is below `min` (or missing).
    MinimumValue {
        /// Field to test.
        field: Field,
        /// Inclusive lower bound.
        min: f64,
    },

    /// Drop records in any of the listed industries.
    ExcludeIndustries {
        /// Industry names, matched exactly.
        industries: Vec<String>,
    },

    /// Drop the bottom or top `fraction` of records ranked by `field`.
    QuantileCutoff {
        /// Ranking field.
        field: Field,
        /// Fraction to remove, in [0, 1).
        fraction: f64,
        /// Which end to remove.
        #[serde(default)]
        side: CutoffSide,
    },

    /// Keep records matching a closure. Not serializable.
    #[serde(skip)]
    Custom(Predicate),
}

impl StageRule {
    /// Returns true for rules that need the whole population (quantiles).
    #[must_use]
    pub fn is_population_relative(&self) -> bool {
        matches!(self, Self::QuantileCutoff { .. })
    }

    /// Evaluates a record-local rule.
    ///
    /// Returns `None` for population-relative rules, which cannot be decided
    /// from one record alone.
    #[must_use]
    pub fn keeps(&self, record: &InstrumentRecord) -> Option<bool> {
        match self {
            Self::ExcludeFlag { flag } => Some(!flag.is_set(record)),
            Self::RequirePositive { field } => Some(field.value(record).is_some_and(|v| v > 0.0)),
            Self::MinimumValue { field, min } => {
                Some(field.value(record).is_some_and(|v| v >= *min))
            }
            Self::ExcludeIndustries { industries } => {
                Some(!industries.iter().any(|i| *i == record.industry))
            }
            Self::QuantileCutoff { .. } => None,
            Self::Custom(predicate) => Some(predicate.keeps(record)),
        }
    }
}

/// An ordered, named filtering step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningStage {
    /// Stage name reported in the audit trail.
    pub name: String,

    /// What the stage excludes.
    #[serde(flatten)]
    pub rule: StageRule,
}

impl ScreeningStage {
    /// Creates a stage from a name and rule.
    pub fn new(name: impl Into<String>, rule: StageRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    /// Drops records with `flag` set.
    pub fn exclude_flag(name: impl Into<String>, flag: Flag) -> Self {
        Self::new(name, StageRule::ExcludeFlag { flag })
    }

    /// Drops records whose `field` is not positive.
    pub fn require_positive(name: impl Into<String>, field: Field) -> Self {
        Self::new(name, StageRule::RequirePositive { field })
    }

    /// Drops records whose `field` is below `min`.
    pub fn minimum(name: impl Into<String>, field: Field, min: f64) -> Self {
        Self::new(name, StageRule::MinimumValue { field, min })
    }

    /// Drops records in the given industries.
    pub fn exclude_industries<I, S>(name: impl Into<String>, industries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            StageRule::ExcludeIndustries {
                industries: industries.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Drops the bottom `fraction` of records by `field`.
    pub fn drop_bottom(name: impl Into<String>, field: Field, fraction: f64) -> Self {
        Self::new(
            name,
            StageRule::QuantileCutoff {
                field,
                fraction,
                side: CutoffSide::Bottom,
            },
        )
    }

    /// Drops the top `fraction` of records by `field`.
    pub fn drop_top(name: impl Into<String>, field: Field, fraction: f64) -> Self {
        Self::new(
            name,
            StageRule::QuantileCutoff {
                field,
                fraction,
                side: CutoffSide::Top,
            },
        )
    }

    /// Keeps records for which `f` returns true.
    pub fn keep_if(
        name: impl Into<String>,
        f: impl Fn(&InstrumentRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, StageRule::Custom(Predicate::new(f)))
    }

    /// Validates the stage parameters.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] when a quantile fraction lies
    /// outside [0, 1) or a minimum bound is not finite.
    pub fn validate(&self) -> IndexResult<()> {
        match &self.rule {
            StageRule::QuantileCutoff { fraction, .. } => {
                if !(0.0..1.0).contains(fraction) {
                    return Err(IndexError::invalid_config(
                        format!("stages.{}.fraction", self.name),
                        format!("must be in [0, 1), got {fraction}"),
                    ));
                }
            }
            StageRule::MinimumValue { min, .. } if !min.is_finite() => {
                return Err(IndexError::invalid_config(
                    format!("stages.{}.min", self.name),
                    "must be finite",
                ));
            }
            _ => {}
        }
        Ok(())
    }
}
