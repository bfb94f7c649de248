//! Parallel processing utilities for record-level evaluation.
//!
//! Provides conditional parallel iteration based on configuration
//! and collection size. Uses rayon when the `parallel` feature is enabled.
//! Every helper preserves input order, so results are identical either way.

use fcindex_core::ParallelConfig;

/// Returns true if `config` asks for parallel iteration over `count` items
/// and the `parallel` feature is compiled in.
#[must_use]
pub fn should_parallelize(config: &ParallelConfig, count: usize) -> bool {
    config.should_parallelize(count, cfg!(feature = "parallel"))
}

/// Maps a function over items, conditionally using parallel iteration.
///
/// Uses parallel iteration when:
/// - The `parallel` feature is enabled
/// - `config.enabled` is true
/// - The collection size reaches `config.threshold`
///
/// # Example
///
/// ```ignore
/// let values = maybe_parallel_map(&records, &config, |r| field.value(r));
/// ```
#[allow(unused_variables)]
pub fn maybe_parallel_map<T, U, F>(items: &[T], config: &ParallelConfig, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if should_parallelize(config, items.len()) {
            return items.par_iter().map(f).collect();
        }
    }

    items.iter().map(f).collect()
}

/// Keeps the items for which `keep` returns true, in their original order.
#[allow(unused_variables)]
pub fn maybe_parallel_filter<T, F>(items: &[T], config: &ParallelConfig, keep: F) -> Vec<T>
where
    T: Sync + Send + Clone,
    F: Fn(&T) -> bool + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if should_parallelize(config, items.len()) {
            return items.par_iter().filter(|item| keep(item)).cloned().collect();
        }
    }

    items.iter().filter(|item| keep(item)).cloned().collect()
}
