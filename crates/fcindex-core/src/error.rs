//! Error types for index construction.
//!
//! Only fatal conditions live here. Non-fatal outcomes such as a component
//! shortfall or allocator non-convergence travel as data on the result types.

use thiserror::Error;

/// Result type for index construction operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that abort an index construction stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// No weight vector can respect the cap and still sum to one.
    #[error(
        "Infeasible configuration: {count} components with max weight {max_weight} cannot sum to 1"
    )]
    ConfigurationInfeasible {
        /// Number of components being weighted.
        count: usize,
        /// The configured cap.
        max_weight: f64,
    },

    /// Screening left nothing to select from.
    #[error("Empty universe after screening stage '{stage}'")]
    EmptyUniverse {
        /// Name of the last stage applied (or "input" when none ran).
        stage: String,
    },

    /// Base market value for valuation was zero or negative.
    #[error("Invalid valuation base: {value} (must be positive)")]
    InvalidValuationBase {
        /// The offending base value.
        value: f64,
    },

    /// A final weight exceeded the cap beyond tolerance.
    #[error("Weight for '{id}' is {weight:.8}, above cap {max_weight}")]
    CapViolation {
        /// Component identifier.
        id: String,
        /// The final weight.
        weight: f64,
        /// The configured cap.
        max_weight: f64,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// The configuration field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// An instrument record failed validation.
    #[error("Invalid record '{id}': {reason}")]
    InvalidRecord {
        /// The record identifier.
        id: String,
        /// Why the record was rejected.
        reason: String,
    },

    /// The same identifier appeared twice in one snapshot.
    #[error("Duplicate instrument identifier '{id}'")]
    DuplicateIdentifier {
        /// The repeated identifier.
        id: String,
    },

    /// A component had no entry in the weight table.
    #[error("No weight for component '{id}'")]
    MissingWeight {
        /// The component identifier.
        id: String,
    },

    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration: {reason}")]
    ConfigLoad {
        /// Underlying reason.
        reason: String,
    },
}

impl IndexError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid record error.
    #[must_use]
    pub fn invalid_record(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an empty universe error.
    #[must_use]
    pub fn empty_universe(stage: impl Into<String>) -> Self {
        Self::EmptyUniverse {
            stage: stage.into(),
        }
    }

    /// Create a configuration load error.
    #[must_use]
    pub fn config_load(reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            reason: reason.into(),
        }
    }

    /// Returns true if the error came from configuration rather than data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationInfeasible { .. } | Self::InvalidConfig { .. } | Self::ConfigLoad { .. }
        )
    }
}
