#![allow(dead_code)]

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::PrefetchSink;
use crate::market_data::client::StatsApi;
use crate::market_data::types::Pair;
use crate::metrics::prometheus::record_prefetch;

#[derive(Debug, Clone, PartialEq)]
pub enum PrefetchEntry {
    Loading,
    Ready(Pair),
    Failed(String),
}

/// Per-pair detail cache warmed from prefetch selections.
///
/// Cheap to clone; clones share the same map. A pair that is loading or
/// loaded is never fetched twice, a failed one is retried on the next
/// selection that names it.
#[derive(Clone)]
pub struct PrefetchCache {
    api: Arc<dyn StatsApi>,
    entries: Arc<DashMap<String, PrefetchEntry>>,
}

impl PrefetchCache {
    pub fn new(api: Arc<dyn StatsApi>) -> Self {
        Self {
            api,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, pair_id: &str) -> Option<PrefetchEntry> {
        self.entries.get(pair_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pairs whose fetch is still in flight.
    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), PrefetchEntry::Loading))
            .count()
    }

    /// Marks `pair_id` as loading unless it is already loading or loaded.
    fn claim(&self, pair_id: &str) -> bool {
        match self.entries.entry(pair_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(PrefetchEntry::Loading);
                true
            }
            Entry::Occupied(mut slot) => {
                if matches!(slot.get(), PrefetchEntry::Failed(_)) {
                    slot.insert(PrefetchEntry::Loading);
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl PrefetchSink for PrefetchCache {
    fn prefetch(&self, pair_ids: Vec<String>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(count = pair_ids.len(), "no runtime available, prefetch skipped");
            return;
        };

        let claimed: Vec<String> = pair_ids.into_iter().filter(|id| self.claim(id)).collect();
        info!(count = claimed.len(), "prefetching pair details");

        for pair_id in claimed {
            let api = self.api.clone();
            let entries = self.entries.clone();
            runtime.spawn(async move {
                let entry = match api.get_pair_overview(&pair_id).await {
                    Ok(pair) => {
                        record_prefetch("ok");
                        debug!(%pair_id, "pair prefetched");
                        PrefetchEntry::Ready(pair)
                    }
                    Err(err) => {
                        record_prefetch("error");
                        warn!(%pair_id, error = %err, "pair prefetch failed");
                        PrefetchEntry::Failed(err.to_string())
                    }
                };
                entries.insert(pair_id, entry);
            });
        }
    }
}
