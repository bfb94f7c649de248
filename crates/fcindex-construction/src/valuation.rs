//! Index level calculation.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use fcindex_core::{IndexError, IndexResult};

use crate::selection::ComponentSet;
use crate::weighting::WeightTable;

/// Index level relative to a base reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexValuation {
    /// `current_value / base_value * base_point`.
    pub index_value: f64,
    /// Weighted market value on the base date.
    pub base_value: f64,
    /// Index level on the base date.
    pub base_point: f64,
    /// Weighted market value of the current component set.
    pub current_value: f64,
    /// Valuation date.
    pub as_of: NaiveDate,
}

impl IndexValuation {
    /// Change in index level since the base date, as a fraction.
    #[must_use]
    pub fn change_since_base(&self) -> f64 {
        self.index_value / self.base_point - 1.0
    }
}

/// Sums `price * shares * weight` over the components.
///
/// # Errors
///
/// Returns [`IndexError::MissingWeight`] if a component has no entry in
/// `weights`.
pub fn weighted_market_value(components: &ComponentSet<'_>, weights: &WeightTable) -> IndexResult<f64> {
    components.iter().try_fold(0.0, |acc, record| {
        let weight = weights
            .weight(&record.id)
            .ok_or_else(|| IndexError::MissingWeight {
                id: record.id.to_string(),
            })?;
        Ok(acc + record.market_value() * weight)
    })
}

/// Values the index against a base reference.
///
/// # Errors
///
/// - [`IndexError::InvalidValuationBase`] if `base_value` is not positive
/// - [`IndexError::InvalidConfig`] if `base_point` is not positive
/// - [`IndexError::MissingWeight`] if a component has no weight
pub fn value(
    components: &ComponentSet<'_>,
    weights: &WeightTable,
    base_value: f64,
    base_point: f64,
    as_of: NaiveDate,
) -> IndexResult<IndexValuation> {
    if !(base_value > 0.0 && base_value.is_finite()) {
        return Err(IndexError::InvalidValuationBase { value: base_value });
    }
    if !(base_point > 0.0 && base_point.is_finite()) {
        return Err(IndexError::invalid_config(
            "index.base_point",
            format!("must be positive, got {base_point}"),
        ));
    }

    let current_value = weighted_market_value(components, weights)?;
    let index_value = current_value / base_value * base_point;

    info!(%as_of, current_value, base_value, index_value, "index valued");

    Ok(IndexValuation {
        index_value,
        base_value,
        base_point,
        current_value,
        as_of,
    })
}
