//! Domain types for index construction.
//!
//! - [`InstrumentRecord`]: one candidate instrument with its metrics and flags
//! - [`Universe`]: a validated snapshot of records
//! - [`Field`] / [`Flag`]: declarative accessors used by configuration
//! - [`ScreeningStage`]: one ordered exclusion step

mod field;
mod id;
mod record;
mod stage;
mod universe;

pub use field::{Field, Flag};
pub use id::InstrumentId;
pub use record::{EligibilityFlags, InstrumentRecord, InstrumentRecordBuilder};
pub use stage::{CutoffSide, Predicate, ScreeningStage, StageRule};
pub use universe::Universe;
