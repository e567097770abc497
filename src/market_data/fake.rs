//! Scripted `StatsApi` used by the orchestration tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::client::{FetchError, FetchResult, StatsApi};
use super::types::{MarketStats, Pair, Token};

pub fn token(symbol: &str) -> Token {
    Token {
        id: format!("0x{}", symbol.to_lowercase()),
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        decimals: "18".to_string(),
    }
}

pub fn pair(id: &str, volume: i64, reserve: i64) -> Pair {
    Pair {
        id: id.to_string(),
        token0: token("WETH"),
        token1: token("DAI"),
        volume_usd: Decimal::from(volume),
        reserve_usd: Decimal::from(reserve),
        tx_count: 0,
        token0_price: None,
        token1_price: None,
    }
}

pub fn stats(id: &str) -> MarketStats {
    MarketStats {
        id: id.to_string(),
        token0: token("USDC"),
        token1: token("WETH"),
        volume_usd: Decimal::ZERO,
        liquidity: Decimal::ZERO,
        fees_usd: Decimal::ZERO,
        returns_usd: Decimal::ZERO,
        impermanent_loss: Decimal::ZERO,
    }
}

pub fn stats_list(ids: impl IntoIterator<Item = String>) -> Vec<MarketStats> {
    ids.into_iter().map(|id| stats(&id)).collect()
}

fn api_error(message: &str) -> FetchError {
    FetchError::Api(message.to_string())
}

/// Every operation answers from its slot; `None` in an `Option` slot means
/// the call fails with a canned message naming the operation.
pub struct FakeApi {
    pub top_pairs: Option<Vec<Pair>>,
    pub weekly: Option<Vec<MarketStats>>,
    pub daily: Option<Vec<MarketStats>>,
    pub overviews: Mutex<HashMap<String, Pair>>,
    pub market: Option<Vec<MarketStats>>,
    pub delays: HashMap<&'static str, Duration>,
    pub overview_calls: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            top_pairs: Some(Vec::new()),
            weekly: Some(Vec::new()),
            daily: Some(Vec::new()),
            overviews: Mutex::new(HashMap::new()),
            market: Some(Vec::new()),
            delays: HashMap::new(),
            overview_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeApi {
    pub fn with_overview(self, pair: Pair) -> Self {
        self.overviews
            .lock()
            .unwrap()
            .insert(pair.id.clone(), pair);
        self
    }

    pub fn with_delay(mut self, op: &'static str, delay: Duration) -> Self {
        self.delays.insert(op, delay);
        self
    }

    async fn pause(&self, op: &'static str) {
        if let Some(delay) = self.delays.get(op) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl StatsApi for FakeApi {
    async fn get_top_pairs(&self) -> FetchResult<Vec<Pair>> {
        self.pause("getTopPairs").await;
        self.top_pairs.clone().ok_or_else(|| api_error("top pairs down"))
    }

    async fn get_weekly_top_performing_pairs(&self) -> FetchResult<Vec<MarketStats>> {
        self.pause("getWeeklyTopPerformingPairs").await;
        self.weekly.clone().ok_or_else(|| api_error("weekly down"))
    }

    async fn get_daily_top_performing_pairs(&self) -> FetchResult<Vec<MarketStats>> {
        self.pause("getDailyTopPerformingPairs").await;
        self.daily.clone().ok_or_else(|| api_error("daily down"))
    }

    async fn get_pair_overview(&self, pair_id: &str) -> FetchResult<Pair> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        self.pause("getPairOverview").await;
        self.overviews
            .lock()
            .unwrap()
            .get(pair_id)
            .cloned()
            .ok_or_else(|| api_error("overview down"))
    }

    async fn get_market_data(&self) -> FetchResult<Vec<MarketStats>> {
        self.pause("getMarketData").await;
        self.market.clone().ok_or_else(|| api_error("market down"))
    }
}
