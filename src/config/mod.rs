use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

use crate::feed::protocol::GAS_PRICE_TOPIC;

/// WETH/DAI, always shown on the landing view and always prefetched.
pub const DEFAULT_REFERENCE_PAIR_ID: &str = "0xa478c2975ab1ea89e8196811f51a7b7ade33eb11";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api/v1/uniswap";
const DEFAULT_WS_API_URL: &str = "ws://localhost:3001";
const DEFAULT_RECONNECT_MAX_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_base_url: Url,
    pub ws_api_url: Url,
    pub reference_pair_id: String,
    pub feed_topics: Vec<String>,
    pub reconnect_max: Duration,
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let log_level = get("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let api_base_url = get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(&api_base_url)
            .with_context(|| format!("invalid API_BASE_URL: {api_base_url}"))?;

        let ws_api_url = get("WS_API_URL").unwrap_or_else(|| DEFAULT_WS_API_URL.to_string());
        let ws_api_url =
            Url::parse(&ws_api_url).with_context(|| format!("invalid WS_API_URL: {ws_api_url}"))?;
        if !matches!(ws_api_url.scheme(), "ws" | "wss") {
            anyhow::bail!("WS_API_URL must use ws:// or wss://, got {ws_api_url}");
        }

        let reference_pair_id = get("REFERENCE_PAIR_ID")
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_REFERENCE_PAIR_ID.to_string());

        let feed_topics = get("FEED_TOPICS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|topics| !topics.is_empty())
            .unwrap_or_else(|| vec![GAS_PRICE_TOPIC.to_string()]);

        let reconnect_max = match get("FEED_RECONNECT_MAX_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid FEED_RECONNECT_MAX_SECS: {raw}"))?,
            None => DEFAULT_RECONNECT_MAX_SECS,
        };

        let metrics_addr = get("METRICS_ADDR")
            .map(|raw| {
                raw.parse::<SocketAddr>()
                    .with_context(|| format!("invalid METRICS_ADDR: {raw}"))
            })
            .transpose()?;

        Ok(Self {
            log_level,
            api_base_url,
            ws_api_url,
            reference_pair_id,
            feed_topics,
            reconnect_max: Duration::from_secs(reconnect_max.max(1)),
            metrics_addr,
        })
    }
}
