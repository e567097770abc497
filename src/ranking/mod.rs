#![allow(dead_code)]

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::market_data::types::Pair;

/// A pair together with its rank positions in the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPair {
    #[serde(flatten)]
    pub pair: Pair,
    #[serde(rename = "volumeRanking")]
    pub volume_ranking: usize,
    #[serde(rename = "liquidityRanking")]
    pub liquidity_ranking: usize,
}

/// Display-oriented wrapper handed to the views.
#[derive(Debug, Clone, PartialEq)]
pub struct PairView {
    pub pair: Pair,
}

impl PairView {
    pub fn new(pair: Pair) -> Self {
        Self { pair }
    }

    pub fn id(&self) -> &str {
        &self.pair.id
    }

    /// `"WETH/DAI"` style label.
    pub fn readable(&self) -> String {
        format!("{}/{}", self.pair.token0.symbol, self.pair.token1.symbol)
    }
}

/// Ranked views over one fetched snapshot of pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedPairSet {
    /// Descending by volume.
    pub pairs: Vec<PairView>,
    pub lookup: HashMap<String, RankedPair>,
    /// Descending by liquidity.
    pub by_liquidity: Vec<Pair>,
}

impl RankedPairSet {
    pub fn get(&self, pair_id: &str) -> Option<&RankedPair> {
        self.lookup.get(pair_id)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Stable descending order of `pairs` by `metric`, as indices into `pairs`.
fn rank_order(pairs: &[Pair], metric: impl Fn(&Pair) -> Decimal) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pairs.len()).collect();
    // sort_by is stable, so equal metrics keep input order
    order.sort_by(|&a, &b| metric(&pairs[b]).cmp(&metric(&pairs[a])));
    order
}

/// Computes volume and liquidity rankings for a raw pair list.
///
/// Duplicate identifiers are collapsed to their first occurrence so that
/// every ranking is a contiguous `0..n` range.
pub fn calculate_pair_rankings(raw: Vec<Pair>) -> RankedPairSet {
    let raw_len = raw.len();
    let mut seen = HashSet::with_capacity(raw_len);
    let unique: Vec<Pair> = raw
        .into_iter()
        .filter(|pair| seen.insert(pair.id.clone()))
        .collect();
    if unique.len() != raw_len {
        debug!(
            dropped = raw_len - unique.len(),
            "duplicate pair ids in ranking input"
        );
    }

    let volume_order = rank_order(&unique, |p| p.volume_usd);
    let liquidity_order = rank_order(&unique, |p| p.reserve_usd);

    let mut liquidity_rank = vec![0; unique.len()];
    for (rank, &idx) in liquidity_order.iter().enumerate() {
        liquidity_rank[idx] = rank;
    }

    let mut lookup = HashMap::with_capacity(unique.len());
    let mut pairs = Vec::with_capacity(unique.len());
    for (rank, &idx) in volume_order.iter().enumerate() {
        let pair = &unique[idx];
        lookup.insert(
            pair.id.clone(),
            RankedPair {
                pair: pair.clone(),
                volume_ranking: rank,
                liquidity_ranking: liquidity_rank[idx],
            },
        );
        pairs.push(PairView::new(pair.clone()));
    }

    let by_liquidity = liquidity_order
        .iter()
        .map(|&idx| unique[idx].clone())
        .collect();

    RankedPairSet {
        pairs,
        lookup,
        by_liquidity,
    }
}
