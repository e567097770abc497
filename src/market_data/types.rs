#![allow(dead_code)]

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Anything that can be addressed by a pair identifier.
pub trait HasPairId {
    fn pair_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub decimals: String,
}

/// One pool as served by the statistics API.
///
/// Metrics arrive either as JSON numbers or as decimal strings (subgraph
/// style); both decode into `Decimal`. Prices are absent for pools the API
/// has not priced yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub id: String,
    pub token0: Token,
    pub token1: Token,
    #[serde(rename = "volumeUSD", default)]
    pub volume_usd: Decimal,
    #[serde(rename = "reserveUSD", default)]
    pub reserve_usd: Decimal,
    #[serde(rename = "txCount", default, deserialize_with = "count")]
    pub tx_count: u64,
    #[serde(rename = "token0Price", default)]
    pub token0_price: Option<Decimal>,
    #[serde(rename = "token1Price", default)]
    pub token1_price: Option<Decimal>,
}

/// Counters come as `"123"` from subgraph payloads and as `123` elsewhere.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

impl HasPairId for Pair {
    fn pair_id(&self) -> &str {
        &self.id
    }
}

/// Aggregate performance record for a pair over a stats window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub id: String,
    pub token0: Token,
    pub token1: Token,
    #[serde(rename = "volumeUSD", default)]
    pub volume_usd: Decimal,
    #[serde(default)]
    pub liquidity: Decimal,
    #[serde(rename = "feesUSD", default)]
    pub fees_usd: Decimal,
    #[serde(rename = "returnsUSD", default)]
    pub returns_usd: Decimal,
    #[serde(rename = "impermanentLoss", default)]
    pub impermanent_loss: Decimal,
}

impl HasPairId for MarketStats {
    fn pair_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasPrices {
    pub standard: f64,
    pub fast: f64,
    pub faster: f64,
}
