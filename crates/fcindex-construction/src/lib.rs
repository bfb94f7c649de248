//! # Fcindex Construction
//!
//! Turns a universe snapshot into a capped-weight index.
//!
//! The pipeline has four steps, each usable on its own:
//!
//! - **Screening** ([`screening`]): ordered eligibility stages with an audit trail
//! - **Selection** ([`selection`]): ranking into a component set and a backup reserve
//! - **Weighting** ([`weighting`]): iterative capped proportional allocation
//! - **Valuation** ([`valuation`]): weighted market value against a base reference
//!
//! [`IndexConstructor`] runs all four from an [`fcindex_core::IndexConfig`].
//!
//! ## Design Philosophy
//!
//! - **Pure functions**: all inputs explicit, no I/O or caching
//! - **Borrowed views**: selected records reference the input universe
//! - **Non-fatal conditions as data**: shortfalls and non-convergence are
//!   reported on results, never raised
//!
//! ## Features
//!
//! - `parallel`: evaluate record-level predicates and metrics with rayon
//!   once a population reaches [`fcindex_core::ParallelConfig::threshold`]
//!
//! ## Example
//!
//! ```rust
//! use fcindex_construction::weighting::cap_weights;
//! use fcindex_core::AllocatorConfig;
//!
//! let result = cap_weights(&[10.0, 20.0, 30.0, 40.0], &AllocatorConfig::with_max_weight(1.0)).unwrap();
//! assert!((result.weights[3] - 0.4).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod constructor;
pub mod parallel;
pub mod report;
pub mod screening;
pub mod selection;
pub mod valuation;
pub mod weighting;

pub use constructor::{IndexConstructor, IndexRun, RunWarning};
pub use report::{ComponentSummary, IndustryBucket, IndustryDistribution};
pub use screening::{screen, Screening, ScreeningAudit, ScreeningPipeline, StageOutcome};
pub use selection::{
    select, BackupSet, ComponentSelector, ComponentSet, RankedSet, Selection, SizeShortfall,
};
pub use valuation::{value, weighted_market_value, IndexValuation};
pub use weighting::{
    allocate, allocate_with, cap_weights, Allocation, AllocationWarning, CappedWeights,
    WeightEntry, WeightTable,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::constructor::{IndexConstructor, IndexRun, RunWarning};
    pub use crate::report::{ComponentSummary, IndustryDistribution};
    pub use crate::screening::{screen, ScreeningAudit, ScreeningPipeline};
    pub use crate::selection::{select, ComponentSelector, Selection, SizeShortfall};
    pub use crate::valuation::{value, IndexValuation};
    pub use crate::weighting::{allocate, cap_weights, Allocation, AllocationWarning, WeightTable};
    pub use fcindex_core::prelude::*;
}
