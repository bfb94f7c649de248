//! Instrument identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument identifier (exchange code such as `600519.SH`).
///
/// Ordering is lexicographic and is used to break ranking ties.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    /// Create a new instrument ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is blank.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut ids = vec![
            InstrumentId::new("000002.SZ"),
            InstrumentId::new("000001.SZ"),
            InstrumentId::new("600000.SH"),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "000001.SZ");
        assert_eq!(ids[2].as_str(), "600000.SH");
    }

    #[test]
    fn test_serde_transparent() {
        let id = InstrumentId::new("600519.SH");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"600519.SH\"");
    }

    #[test]
    fn test_blank() {
        assert!(InstrumentId::new("  ").is_blank());
        assert!(!InstrumentId::from("A").is_blank());
    }
}
