#![allow(dead_code)]

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::market_data::types::{GasPrices, MarketStats};
use crate::ranking::RankedPairSet;

/// The independent acquisition flows run at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    AllPairs,
    TopPairs,
    MarketData,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::AllPairs => "all_pairs",
            Flow::TopPairs => "top_pairs",
            Flow::MarketData => "market_data",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of the shared error slot. Whichever flow failed last owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionError {
    pub flow: Flow,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AllPairsState {
    pub is_loading: bool,
    pub set: Option<Arc<RankedPairSet>>,
}

impl Default for AllPairsState {
    fn default() -> Self {
        Self {
            is_loading: true,
            set: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopPairsSnapshot {
    pub daily: Vec<MarketStats>,
    pub weekly: Vec<MarketStats>,
}

/// What the main content region should show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum MainContent {
    Error(AcquisitionError),
    Loading,
    Ready,
}

struct Slices {
    all_pairs: watch::Sender<AllPairsState>,
    top_pairs: watch::Sender<Option<Arc<TopPairsSnapshot>>>,
    market_data: watch::Sender<Option<Arc<Vec<MarketStats>>>>,
    gas_prices: watch::Sender<Option<GasPrices>>,
    error: watch::Sender<Option<AcquisitionError>>,
}

/// Application state published by the bootstrap flows and the live feed.
///
/// Each slice is replaced wholesale on publish. Cheap to clone; clones share
/// the same slices.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Slices>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Slices {
                all_pairs: watch::channel(AllPairsState::default()).0,
                top_pairs: watch::channel(None).0,
                market_data: watch::channel(None).0,
                gas_prices: watch::channel(None).0,
                error: watch::channel(None).0,
            }),
        }
    }

    // ── publishers ───────────────────────────────────────────────

    pub fn publish_all_pairs(&self, set: RankedPairSet) {
        self.inner.all_pairs.send_replace(AllPairsState {
            is_loading: false,
            set: Some(Arc::new(set)),
        });
    }

    pub fn publish_top_pairs(&self, snapshot: TopPairsSnapshot) {
        self.inner.top_pairs.send_replace(Some(Arc::new(snapshot)));
    }

    pub fn publish_market_data(&self, stats: Vec<MarketStats>) {
        self.inner.market_data.send_replace(Some(Arc::new(stats)));
    }

    pub fn publish_gas_prices(&self, prices: GasPrices) {
        self.inner.gas_prices.send_replace(Some(prices));
    }

    /// Overwrites the shared error slot.
    pub fn publish_error(&self, flow: Flow, message: impl Into<String>) {
        self.inner.error.send_replace(Some(AcquisitionError {
            flow,
            message: message.into(),
        }));
    }

    // ── readers ──────────────────────────────────────────────────

    pub fn all_pairs(&self) -> AllPairsState {
        self.inner.all_pairs.borrow().clone()
    }

    pub fn top_pairs(&self) -> Option<Arc<TopPairsSnapshot>> {
        self.inner.top_pairs.borrow().clone()
    }

    pub fn market_data(&self) -> Option<Arc<Vec<MarketStats>>> {
        self.inner.market_data.borrow().clone()
    }

    pub fn gas_prices(&self) -> Option<GasPrices> {
        *self.inner.gas_prices.borrow()
    }

    pub fn error(&self) -> Option<AcquisitionError> {
        self.inner.error.borrow().clone()
    }

    /// An acquisition error replaces the main content entirely.
    pub fn main_content(&self) -> MainContent {
        if let Some(err) = self.error() {
            return MainContent::Error(err);
        }
        if self.all_pairs().is_loading {
            MainContent::Loading
        } else {
            MainContent::Ready
        }
    }

    pub fn subscribe_all_pairs(&self) -> watch::Receiver<AllPairsState> {
        self.inner.all_pairs.subscribe()
    }

    pub fn subscribe_top_pairs(&self) -> watch::Receiver<Option<Arc<TopPairsSnapshot>>> {
        self.inner.top_pairs.subscribe()
    }

    pub fn subscribe_market_data(&self) -> watch::Receiver<Option<Arc<Vec<MarketStats>>>> {
        self.inner.market_data.subscribe()
    }

    pub fn subscribe_gas_prices(&self) -> watch::Receiver<Option<GasPrices>> {
        self.inner.gas_prices.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<AcquisitionError>> {
        self.inner.error.subscribe()
    }
}
