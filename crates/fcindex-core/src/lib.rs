//! # Fcindex Core
//!
//! Core types, errors, and configuration for capitalization-style index
//! construction.
//!
//! This crate provides the foundational building blocks used throughout Fcindex:
//!
//! - **Types**: [`InstrumentRecord`], [`Universe`], [`Field`], [`Flag`], [`ScreeningStage`]
//! - **Errors**: [`IndexError`] for fatal conditions
//! - **Configuration**: [`IndexConfig`] with TOML loading and validation
//! - **Stats**: quantile and tolerance helpers
//!
//! ## Example
//!
//! ```rust
//! use fcindex_core::prelude::*;
//!
//! let record = InstrumentRecord::builder()
//!     .id("600519.SH")
//!     .price(1500.0)
//!     .shares(1.25e9)
//!     .free_cash_flow(6.0e10)
//!     .enterprise_value(1.8e12)
//!     .build()
//!     .unwrap();
//!
//! assert!(Field::FcfYield.value(&record).unwrap() > 0.03);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::{
    AllocatorConfig, IndexConfig, IndexMetadata, ParallelConfig, SelectionConfig,
    ValuationConfig, WeightingConfig,
};
pub use error::{IndexError, IndexResult};
pub use types::{
    CutoffSide, EligibilityFlags, Field, Flag, InstrumentId, InstrumentRecord,
    InstrumentRecordBuilder, Predicate, ScreeningStage, StageRule, Universe,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{AllocatorConfig, IndexConfig, ParallelConfig};
    pub use crate::error::{IndexError, IndexResult};
    pub use crate::types::{
        CutoffSide, EligibilityFlags, Field, Flag, InstrumentId, InstrumentRecord,
        ScreeningStage, StageRule, Universe,
    };
}
