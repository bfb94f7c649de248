//! A validated universe snapshot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::InstrumentRecord;
use crate::error::{IndexError, IndexResult};

/// An immutable snapshot of candidate instruments.
///
/// Identifiers are unique within a snapshot and every record has passed
/// [`InstrumentRecord::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Universe {
    records: Vec<InstrumentRecord>,
}

impl Universe {
    /// Builds a universe, validating every record and identifier uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DuplicateIdentifier`] on a repeated id, or the
    /// first record validation error.
    pub fn new(records: Vec<InstrumentRecord>) -> IndexResult<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(IndexError::DuplicateIdentifier {
                    id: record.id.to_string(),
                });
            }
        }
        Ok(Self { records })
    }

    /// Returns the records in snapshot order.
    #[must_use]
    pub fn records(&self) -> &[InstrumentRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the snapshot, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<InstrumentRecord> {
        self.records
    }
}

impl<'de> Deserialize<'de> for Universe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let records = Vec::<InstrumentRecord>::deserialize(deserializer)?;
        Self::new(records).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<Vec<InstrumentRecord>> for Universe {
    type Error = IndexError;

    fn try_from(records: Vec<InstrumentRecord>) -> IndexResult<Self> {
        Self::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> InstrumentRecord {
        InstrumentRecord::builder()
            .id(id)
            .price(5.0)
            .shares(1000.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_accepts_unique_ids() {
        let universe = Universe::new(vec![record("A"), record("B")]).unwrap();
        assert_eq!(universe.len(), 2);
        assert_eq!(universe.records()[1].id.as_str(), "B");
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let err = Universe::new(vec![record("A"), record("B"), record("A")]).unwrap_err();
        assert_eq!(err, IndexError::DuplicateIdentifier { id: "A".into() });
    }

    #[test]
    fn test_new_rejects_invalid_record() {
        let mut bad = record("C");
        bad.price = -1.0;
        assert!(matches!(
            Universe::new(vec![bad]),
            Err(IndexError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"[
            {"id":"A","name":"a","industry":"x","market_cap":1.0,"price":1.0,"shares":1.0},
            {"id":"A","name":"b","industry":"x","market_cap":1.0,"price":1.0,"shares":1.0}
        ]"#;
        assert!(serde_json::from_str::<Universe>(json).is_err());
    }

    #[test]
    fn test_empty() {
        assert!(Universe::default().is_empty());
    }
}
