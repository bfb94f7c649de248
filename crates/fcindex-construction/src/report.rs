//! Component and industry summaries of a weighted index.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::selection::ComponentSet;
use crate::weighting::WeightTable;

/// Weight at or above which a component counts as concentrated.
pub const CONCENTRATION_THRESHOLD: f64 = 0.05;

/// Label for components with no industry classification.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Headline statistics over a weight table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComponentSummary {
    /// Number of components.
    pub total_components: usize,
    /// Largest weight.
    pub max_weight: f64,
    /// Smallest weight.
    pub min_weight: f64,
    /// Mean weight.
    pub avg_weight: f64,
    /// Components weighing at least [`CONCENTRATION_THRESHOLD`].
    pub concentration_count: usize,
}

impl ComponentSummary {
    /// Summarizes `table`.
    #[must_use]
    pub fn from_table(table: &WeightTable) -> Self {
        if table.is_empty() {
            return Self::default();
        }

        let weights = table.weights();
        let max_weight = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_weight = weights.iter().copied().fold(f64::INFINITY, f64::min);

        Self {
            total_components: weights.len(),
            max_weight,
            min_weight,
            avg_weight: weights.iter().sum::<f64>() / weights.len() as f64,
            concentration_count: weights
                .iter()
                .filter(|&&w| w >= CONCENTRATION_THRESHOLD)
                .count(),
        }
    }
}

/// Aggregated weight of one industry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryBucket {
    /// Industry name.
    pub industry: String,
    /// Number of components.
    pub count: usize,
    /// Total weight.
    pub weight: f64,
}

/// Index weight by industry, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IndustryDistribution {
    buckets: Vec<IndustryBucket>,
}

impl IndustryDistribution {
    /// Buckets `components` by industry using the weights in `table`.
    ///
    /// Components absent from `table` contribute zero weight.
    #[must_use]
    pub fn from_components(components: &ComponentSet<'_>, table: &WeightTable) -> Self {
        let mut by_industry: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for record in components.iter() {
            let industry = if record.industry.is_empty() {
                UNCLASSIFIED
            } else {
                record.industry.as_str()
            };
            let bucket = by_industry.entry(industry).or_default();
            bucket.0 += 1;
            bucket.1 += table.weight(&record.id).unwrap_or(0.0);
        }

        let mut buckets: Vec<IndustryBucket> = by_industry
            .into_iter()
            .map(|(industry, (count, weight))| IndustryBucket {
                industry: industry.to_string(),
                count,
                weight,
            })
            .collect();
        // Names arrive sorted; the stable sort keeps equal weights in name order.
        buckets.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Self { buckets }
    }

    /// Buckets, largest weight first.
    #[must_use]
    pub fn buckets(&self) -> &[IndustryBucket] {
        &self.buckets
    }

    /// Looks up one industry.
    #[must_use]
    pub fn get(&self, industry: &str) -> Option<&IndustryBucket> {
        self.buckets.iter().find(|b| b.industry == industry)
    }

    /// Number of industries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true if there are no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
