//! Iterative capped proportional weight allocation.
//!
//! Weights are seeded from a sizing metric, then repeatedly clamped to the
//! cap with the excess redistributed to the uncapped entries in proportion
//! to their initial share. Redistribution can push an uncapped entry over
//! the cap, so the loop runs until the uncapped mass balances or the round
//! limit is reached.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use fcindex_core::stats::{close, le_within};
use fcindex_core::{AllocatorConfig, Field, IndexError, IndexResult, InstrumentId, InstrumentRecord};

/// Absorbs representation error in `N * max_weight` when the product is
/// exactly one in real arithmetic (e.g. 3 * (1/3)).
const FEASIBILITY_SLACK: f64 = 1e-12;

/// One component's weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightEntry {
    /// Component identifier.
    pub id: InstrumentId,
    /// Weight implied by the sizing metric alone.
    pub initial_weight: f64,
    /// Final capped weight.
    pub weight: f64,
}

impl WeightEntry {
    /// Ratio of final to initial weight.
    #[must_use]
    pub fn adjustment_factor(&self) -> f64 {
        if self.initial_weight > 0.0 {
            self.weight / self.initial_weight
        } else {
            0.0
        }
    }
}

/// Final component weights in component order, with lookup by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightTable {
    entries: Vec<WeightEntry>,
    #[serde(skip)]
    index: HashMap<InstrumentId, usize>,
}

impl WeightTable {
    fn from_entries(entries: Vec<WeightEntry>) -> IndexResult<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.id.clone(), i).is_some() {
                return Err(IndexError::DuplicateIdentifier {
                    id: entry.id.to_string(),
                });
            }
        }
        Ok(Self { entries, index })
    }

    /// Entries in component order.
    #[must_use]
    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, id: &InstrumentId) -> Option<&WeightEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Looks up a final weight.
    #[must_use]
    pub fn weight(&self, id: &InstrumentId) -> Option<f64> {
        self.get(id).map(|e| e.weight)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in component order.
    pub fn iter(&self) -> impl Iterator<Item = &WeightEntry> {
        self.entries.iter()
    }

    /// Sum of final weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Final weights in component order.
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.weight).collect()
    }

    /// The `n` largest entries, by weight descending then id ascending.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<&WeightEntry> {
        let mut sorted: Vec<&WeightEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
        sorted.truncate(n);
        sorted
    }
}

/// Non-fatal conditions reported alongside an allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationWarning {
    /// The round limit was reached before the weights balanced.
    NonConvergence {
        /// Rounds executed.
        iterations: u32,
        /// Unallocated mass after the last clamp.
        residual: f64,
    },
    /// Every entry sat at the cap, so the remainder was spread equally.
    EqualRedistribution,
    /// Non-positive or non-finite sizing values were raised to the floor.
    SizingFloorApplied {
        /// Number of entries raised.
        count: usize,
    },
}

impl fmt::Display for AllocationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonConvergence {
                iterations,
                residual,
            } => write!(
                f,
                "allocator did not converge after {iterations} rounds (residual {residual:.3e})"
            ),
            Self::EqualRedistribution => {
                write!(f, "remainder spread equally because every weight was capped")
            }
            Self::SizingFloorApplied { count } => {
                write!(f, "{count} sizing values raised to the floor")
            }
        }
    }
}

/// Raw allocator output over a slice of sizing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CappedWeights {
    /// Normalized seed weights.
    pub initial: Vec<f64>,
    /// Final capped weights.
    pub weights: Vec<f64>,
    /// Rounds executed.
    pub iterations: u32,
    /// True if the loop balanced within tolerance.
    pub converged: bool,
    /// True if the equal-spread fallback ran at least once.
    pub equal_fallback: bool,
    /// Sizing values raised to the floor.
    pub floored: usize,
    /// Unallocated mass after the last clamp.
    pub residual: f64,
}

/// A capped allocation over a component set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    /// Final weights keyed by component.
    pub table: WeightTable,
    /// Rounds executed.
    pub iterations: u32,
    /// True if the loop balanced within tolerance.
    pub converged: bool,
    /// True if the equal-spread fallback ran.
    pub equal_fallback: bool,
    /// Non-fatal annotations.
    pub warnings: Vec<AllocationWarning>,
}

/// Runs the capped allocation over raw sizing values.
///
/// Returned weights are in input order. Entries are labelled by position
/// (`#0`, `#1`, ...) in a [`IndexError::CapViolation`].
///
/// # Errors
///
/// - [`IndexError::InvalidConfig`] for an invalid allocator config
/// - [`IndexError::EmptyUniverse`] when `sizing` is empty
/// - [`IndexError::ConfigurationInfeasible`] when `N * max_weight < 1`
/// - [`IndexError::CapViolation`] when a final weight exceeds the cap by
///   more than the tolerance
///
/// # Example
///
/// ```rust
/// use fcindex_construction::weighting::cap_weights;
/// use fcindex_core::AllocatorConfig;
///
/// let result = cap_weights(&[1.0, 1.0, 1.0, 1.0, 96.0], &AllocatorConfig::with_max_weight(0.5)).unwrap();
/// assert!((result.weights[4] - 0.5).abs() < 1e-9);
/// assert!((result.weights[0] - 0.125).abs() < 1e-9);
/// ```
pub fn cap_weights(sizing: &[f64], config: &AllocatorConfig) -> IndexResult<CappedWeights> {
    let result = iterate(sizing, config)?;
    check_cap(&result.weights, config, |i| format!("#{i}"))?;
    Ok(result)
}

/// Allocates capped weights to `components`, sized by `sizing_field`.
///
/// Records without the field are sized at the floor.
///
/// # Errors
///
/// See [`cap_weights`].
pub fn allocate(
    components: &[&InstrumentRecord],
    sizing_field: &Field,
    config: &AllocatorConfig,
) -> IndexResult<Allocation> {
    allocate_with(
        components,
        |record| sizing_field.value(record).unwrap_or(0.0),
        config,
    )
}

/// Allocates capped weights to `components`, sized by a closure.
///
/// # Errors
///
/// See [`cap_weights`].
pub fn allocate_with<F>(
    components: &[&InstrumentRecord],
    sizing: F,
    config: &AllocatorConfig,
) -> IndexResult<Allocation>
where
    F: Fn(&InstrumentRecord) -> f64,
{
    let values: Vec<f64> = components.iter().map(|r| sizing(*r)).collect();
    let result = iterate(&values, config)?;
    check_cap(&result.weights, config, |i| components[i].id.to_string())?;

    let mut warnings = Vec::new();
    if result.floored > 0 {
        warnings.push(AllocationWarning::SizingFloorApplied {
            count: result.floored,
        });
    }
    if result.equal_fallback {
        warnings.push(AllocationWarning::EqualRedistribution);
    }
    if !result.converged {
        warnings.push(AllocationWarning::NonConvergence {
            iterations: result.iterations,
            residual: result.residual,
        });
    }

    let entries = components
        .iter()
        .zip(result.initial.iter().zip(&result.weights))
        .map(|(record, (&initial_weight, &weight))| WeightEntry {
            id: record.id.clone(),
            initial_weight,
            weight,
        })
        .collect();

    info!(
        components = components.len(),
        max_weight = config.max_weight,
        iterations = result.iterations,
        converged = result.converged,
        "allocation complete"
    );

    Ok(Allocation {
        table: WeightTable::from_entries(entries)?,
        iterations: result.iterations,
        converged: result.converged,
        equal_fallback: result.equal_fallback,
        warnings,
    })
}

fn iterate(sizing: &[f64], config: &AllocatorConfig) -> IndexResult<CappedWeights> {
    config.validate()?;

    let n = sizing.len();
    if n == 0 {
        return Err(IndexError::empty_universe("allocation"));
    }
    let cap = config.max_weight;
    if (n as f64) * cap < 1.0 - FEASIBILITY_SLACK {
        return Err(IndexError::ConfigurationInfeasible {
            count: n,
            max_weight: cap,
        });
    }

    // Floored entries never seed above the smallest positive value.
    let floor = sizing
        .iter()
        .copied()
        .filter(|v| is_positive(*v))
        .fold(config.sizing_floor, f64::min);

    let mut floored = 0;
    let mut seeds = Vec::with_capacity(n);
    for &value in sizing {
        if is_positive(value) {
            seeds.push(value);
        } else {
            floored += 1;
            seeds.push(floor);
        }
    }
    if floored > 0 {
        warn!(count = floored, floor, "sizing values floored");
    }

    let total: f64 = seeds.iter().sum();
    let initial: Vec<f64> = seeds.iter().map(|v| v / total).collect();
    let mut weights = initial.clone();

    let mut iterations = 0;
    let mut converged = false;
    let mut equal_fallback = false;
    let mut residual = 0.0;

    for round in 1..=config.max_iterations {
        iterations = round;
        clamp(&mut weights, cap);

        let remaining = 1.0 - weights.iter().sum::<f64>();
        residual = remaining;
        if close(remaining, 0.0, config.tolerance) {
            converged = true;
            break;
        }

        let uncapped_share: f64 = weights
            .iter()
            .zip(&initial)
            .filter(|(w, _)| **w < cap)
            .map(|(_, share)| share)
            .sum();

        if uncapped_share > 0.0 {
            for (w, share) in weights.iter_mut().zip(&initial) {
                if *w < cap {
                    *w += remaining * share / uncapped_share;
                }
            }
        } else {
            equal_fallback = true;
            let each = remaining / n as f64;
            for w in &mut weights {
                *w += each;
            }
        }

        debug!(round, remaining, uncapped_share, "allocator round");
    }

    normalize(&mut weights);
    if weights.iter().any(|&w| w > cap) {
        clamp(&mut weights, cap);
        normalize(&mut weights);
    }

    if !converged {
        warn!(iterations, residual, "allocator round limit reached");
    }
    if equal_fallback {
        warn!("equal redistribution fallback applied");
    }

    Ok(CappedWeights {
        initial,
        weights,
        iterations,
        converged,
        equal_fallback,
        floored,
        residual,
    })
}

fn check_cap<L>(weights: &[f64], config: &AllocatorConfig, label: L) -> IndexResult<()>
where
    L: Fn(usize) -> String,
{
    match weights
        .iter()
        .position(|&w| !le_within(w, config.max_weight, config.tolerance))
    {
        Some(i) => Err(IndexError::CapViolation {
            id: label(i),
            weight: weights[i],
            max_weight: config.max_weight,
        }),
        None => Ok(()),
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn clamp(weights: &mut [f64], cap: f64) {
    for w in weights {
        *w = w.min(cap);
    }
}

fn normalize(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights {
            *w /= sum;
        }
    }
}
