pub mod cache;

use std::collections::HashSet;

use crate::market_data::types::HasPairId;

pub use cache::PrefetchCache;

/// How many entries of each top list are warmed ahead of navigation.
pub const PREFETCH_PER_LIST: usize = 10;

/// Receiver of a prefetch selection. Does the actual per-pair warm-up.
pub trait PrefetchSink: Send + Sync {
    fn prefetch(&self, pair_ids: Vec<String>);
}

/// Picks the pairs to warm: the head of the daily list, the head of the
/// weekly list, then the pinned pair, each id kept only at its first
/// occurrence.
pub fn select_prefetch_targets<D, W, P>(daily: &[D], weekly: &[W], pinned: &P) -> Vec<String>
where
    D: HasPairId,
    W: HasPairId,
    P: HasPairId + ?Sized,
{
    let candidates = daily
        .iter()
        .take(PREFETCH_PER_LIST)
        .map(HasPairId::pair_id)
        .chain(weekly.iter().take(PREFETCH_PER_LIST).map(HasPairId::pair_id))
        .chain(std::iter::once(pinned.pair_id()));

    let mut seen = HashSet::new();
    candidates
        .filter(|id| seen.insert(*id))
        .map(String::from)
        .collect()
}
