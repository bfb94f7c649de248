//! Ranking and component selection.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{info, warn};

use fcindex_core::config::backup_size;
use fcindex_core::{
    Field, IndexError, IndexResult, InstrumentId, InstrumentRecord, ParallelConfig,
    SelectionConfig,
};

use crate::parallel::maybe_parallel_map;

/// Fewer eligible records than the target component count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeShortfall {
    /// Target component count.
    pub requested: usize,
    /// Records actually available.
    pub available: usize,
}

/// An ordered run of selected records, borrowed from the screened universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RankedSet<'a>(Vec<&'a InstrumentRecord>);

/// The primary component set.
pub type ComponentSet<'a> = RankedSet<'a>;

/// The backup reserve.
pub type BackupSet<'a> = RankedSet<'a>;

impl<'a> RankedSet<'a> {
    /// Records in rank order.
    #[must_use]
    pub fn records(&self) -> &[&'a InstrumentRecord] {
        &self.0
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the records in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &'a InstrumentRecord> + '_ {
        self.0.iter().copied()
    }

    /// Identifiers in rank order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'a InstrumentId> {
        self.0.iter().map(|r| &r.id).collect()
    }
}

impl<'a> FromIterator<&'a InstrumentRecord> for RankedSet<'a> {
    fn from_iter<I: IntoIterator<Item = &'a InstrumentRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of component selection.
#[derive(Debug, Clone, Serialize)]
pub struct Selection<'a> {
    /// Top-ranked records, at most the target size.
    pub components: ComponentSet<'a>,
    /// The next records by the same ranking.
    pub backup: BackupSet<'a>,
    /// Set when fewer records were available than requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<SizeShortfall>,
}

impl Selection<'_> {
    /// Returns true if the component set is short of the target.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.shortfall.is_some()
    }
}

/// Ranks screened records and partitions them into components and backups.
#[derive(Debug, Clone)]
pub struct ComponentSelector {
    ranking_field: Field,
    target_size: usize,
    backup_fraction: f64,
    parallel: ParallelConfig,
}

impl ComponentSelector {
    /// Creates a selector ranking by `ranking_field`.
    #[must_use]
    pub fn new(ranking_field: Field, target_size: usize, backup_fraction: f64) -> Self {
        Self {
            ranking_field,
            target_size,
            backup_fraction,
            parallel: ParallelConfig::default(),
        }
    }

    /// Creates a selector from the selection section of an index config.
    #[must_use]
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(
            config.ranking_field.clone(),
            config.target_size,
            config.backup_fraction,
        )
    }

    /// Sets the parallelism config used to evaluate ranking values.
    #[must_use]
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Ranks `screened` descending by the ranking field and takes the top
    /// `target_size` records plus the backup reserve.
    ///
    /// Ties are broken by identifier ascending. Records without a ranking
    /// value sort after every record that has one.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyUniverse`] if `screened` is empty, or
    /// [`IndexError::InvalidConfig`] for a zero target size or a backup
    /// fraction outside [0, 1].
    pub fn select<'a>(&self, screened: &[&'a InstrumentRecord]) -> IndexResult<Selection<'a>> {
        if self.target_size == 0 {
            return Err(IndexError::invalid_config(
                "selection.target_size",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.backup_fraction) {
            return Err(IndexError::invalid_config(
                "selection.backup_fraction",
                format!("must be in [0, 1], got {}", self.backup_fraction),
            ));
        }
        if screened.is_empty() {
            return Err(IndexError::empty_universe("screening"));
        }

        let field = &self.ranking_field;
        let mut ranked: Vec<(Option<f64>, &'a InstrumentRecord)> =
            maybe_parallel_map(screened, &self.parallel, |record| {
                (field.value(record), *record)
            });
        ranked.sort_by(|(va, ra), (vb, rb)| rank_order(*va, *vb).then_with(|| ra.id.cmp(&rb.id)));

        let take = self.target_size.min(ranked.len());
        let backup_take = backup_size(self.target_size, self.backup_fraction);

        let mut rest = ranked.into_iter().map(|(_, record)| record);
        let components: ComponentSet<'a> = rest.by_ref().take(take).collect();
        let backup: BackupSet<'a> = rest.take(backup_take).collect();

        let shortfall = (components.len() < self.target_size).then(|| SizeShortfall {
            requested: self.target_size,
            available: components.len(),
        });
        if let Some(s) = shortfall {
            warn!(
                requested = s.requested,
                available = s.available,
                "component set short of target size"
            );
        }

        info!(
            ranking = %self.ranking_field,
            screened = screened.len(),
            components = components.len(),
            backup = backup.len(),
            "selection complete"
        );

        Ok(Selection {
            components,
            backup,
            shortfall,
        })
    }
}

/// Descending by value, missing values last.
fn rank_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ranks `screened` by `ranking_field` and selects components and backups.
///
/// # Errors
///
/// See [`ComponentSelector::select`].
pub fn select<'a>(
    screened: &[&'a InstrumentRecord],
    ranking_field: &Field,
    target_size: usize,
    backup_fraction: f64,
) -> IndexResult<Selection<'a>> {
    ComponentSelector::new(ranking_field.clone(), target_size, backup_fraction).select(screened)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe(n: usize) -> Vec<InstrumentRecord> {
        (0..n)
            .map(|i| {
                InstrumentRecord::builder()
                    .id(format!("S{i:04}"))
                    .price(10.0)
                    .shares(100.0)
                    .free_cash_flow(i as f64)
                    .enterprise_value(1000.0)
                    .build()
                    .unwrap()
            })
            .collect()
    }

    fn names(set: &RankedSet<'_>) -> Vec<String> {
        set.iter().map(|r| r.id.to_string()).collect()
    }

    #[test]
    fn test_selection_of_150() {
        let records = universe(150);
        let screened: Vec<_> = records.iter().collect();

        let selection = select(&screened, &Field::FcfYield, 100, 0.05).unwrap();
        assert_eq!(selection.components.len(), 100);
        assert_eq!(selection.backup.len(), 5);
        assert!(!selection.is_short());

        // Highest yield first: S0149 down to S0050, then S0049..S0045.
        assert_eq!(selection.components.records()[0].id.as_str(), "S0149");
        assert_eq!(selection.components.records()[99].id.as_str(), "S0050");
        assert_eq!(
            names(&selection.backup),
            vec!["S0049", "S0048", "S0047", "S0046", "S0045"]
        );
    }

    #[test]
    fn test_shortfall() {
        let records = universe(60);
        let screened: Vec<_> = records.iter().collect();

        let selection = select(&screened, &Field::FcfYield, 100, 0.05).unwrap();
        assert_eq!(selection.components.len(), 60);
        assert!(selection.backup.is_empty());
        assert_eq!(
            selection.shortfall,
            Some(SizeShortfall {
                requested: 100,
                available: 60
            })
        );
    }

    #[test]
    fn test_ties_broken_by_identifier() {
        let records: Vec<_> = ["C", "A", "B", "D"]
            .iter()
            .map(|id| {
                InstrumentRecord::builder()
                    .id(*id)
                    .price(1.0)
                    .shares(1.0)
                    .score("quality", 0.5)
                    .build()
                    .unwrap()
            })
            .collect();
        let screened: Vec<_> = records.iter().collect();

        let selection = select(&screened, &Field::Score("quality".into()), 2, 0.5).unwrap();
        assert_eq!(names(&selection.components), vec!["A", "B"]);
        assert_eq!(names(&selection.backup), vec!["C"]);
    }

    #[test]
    fn test_missing_ranking_value_sorts_last() {
        let mut records = universe(3);
        records[2].extra_scores.clear();
        for (i, r) in records.iter_mut().enumerate().take(2) {
            r.extra_scores.insert("q".into(), i as f64);
        }
        let screened: Vec<_> = records.iter().collect();

        let selection = select(&screened, &Field::Score("q".into()), 3, 0.0).unwrap();
        assert_eq!(names(&selection.components), vec!["S0001", "S0000", "S0002"]);
    }

    #[test]
    fn test_backup_minimum_of_one() {
        let records = universe(10);
        let screened: Vec<_> = records.iter().collect();

        let selection = select(&screened, &Field::FcfYield, 5, 0.0).unwrap();
        assert_eq!(selection.backup.len(), 1);
    }

    #[test]
    fn test_empty_is_fatal() {
        assert!(matches!(
            select(&[], &Field::FcfYield, 10, 0.05),
            Err(IndexError::EmptyUniverse { .. })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let records = universe(3);
        let screened: Vec<_> = records.iter().collect();
        assert!(select(&screened, &Field::FcfYield, 0, 0.05).is_err());
        assert!(select(&screened, &Field::FcfYield, 2, 1.5).is_err());
    }
}
