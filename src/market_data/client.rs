use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::market_data::types::{MarketStats, Pair};
use crate::metrics::prometheus::{record_api_latency, record_api_request};

/// Expected failure of a single API call.
///
/// The `Display` form is what ends up in the shared error slot, so it stays
/// short and human readable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("{op}: network error: {message}")]
    Network { op: &'static str, message: String },
    #[error("{op}: HTTP {status}: {message}")]
    Status {
        op: &'static str,
        status: u16,
        message: String,
    },
    #[error("{0}")]
    Api(String),
    #[error("{op}: response carried no data")]
    EmptyResponse { op: &'static str },
    #[error("{op}: could not decode response: {message}")]
    Decode { op: &'static str, message: String },
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Remote statistics API as the orchestration layer needs it.
///
/// Implementations never retry and never time out; the caller owns both
/// decisions.
#[async_trait]
pub trait StatsApi: Send + Sync {
    async fn get_top_pairs(&self) -> FetchResult<Vec<Pair>>;
    async fn get_weekly_top_performing_pairs(&self) -> FetchResult<Vec<MarketStats>>;
    async fn get_daily_top_performing_pairs(&self) -> FetchResult<Vec<MarketStats>>;
    async fn get_pair_overview(&self, pair_id: &str) -> FetchResult<Pair>;
    async fn get_market_data(&self) -> FetchResult<Vec<MarketStats>>;
}

/// Wire envelope every endpoint answers with.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: Option<T>,
    error: Option<String>,
}

/// Turns a raw HTTP answer into the uniform result shape.
fn normalize<T: DeserializeOwned>(op: &'static str, status: u16, body: &[u8]) -> FetchResult<T> {
    let envelope = serde_json::from_slice::<ApiEnvelope<T>>(body);

    if !(200..300).contains(&status) {
        let message = match envelope {
            Ok(ApiEnvelope {
                error: Some(message),
                ..
            }) => message,
            _ => String::from_utf8_lossy(body).chars().take(200).collect(),
        };
        return Err(FetchError::Status {
            op,
            status,
            message,
        });
    }

    match envelope {
        Ok(ApiEnvelope {
            error: Some(message),
            ..
        }) => Err(FetchError::Api(message)),
        Ok(ApiEnvelope { data: Some(data), .. }) => Ok(data),
        Ok(ApiEnvelope { data: None, .. }) => Err(FetchError::EmptyResponse { op }),
        Err(err) => Err(FetchError::Decode {
            op,
            message: err.to_string(),
        }),
    }
}

/// reqwest-backed client for the statistics API.
#[derive(Clone, Debug)]
pub struct HttpStatsApi {
    http: reqwest::Client,
    base: Url,
}

impl HttpStatsApi {
    pub fn new(base: Url) -> anyhow::Result<Self> {
        if base.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot carry a path: {base}");
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, op: &'static str, segments: &[&str]) -> FetchResult<T> {
        let url = self.endpoint(segments);
        let started = Instant::now();

        let result = match self.http.get(url.clone()).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.bytes().await {
                    Ok(body) => normalize(op, status, &body),
                    Err(err) => Err(FetchError::Network {
                        op,
                        message: err.to_string(),
                    }),
                }
            }
            Err(err) => Err(FetchError::Network {
                op,
                message: err.to_string(),
            }),
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
        record_api_latency(op, latency_ms);
        match &result {
            Ok(_) => {
                record_api_request(op, "ok");
                debug!(op, %url, latency_ms, "api request complete");
            }
            Err(err) => {
                record_api_request(op, "error");
                warn!(op, %url, error = %err, "api request failed");
            }
        }
        result
    }
}

#[async_trait]
impl StatsApi for HttpStatsApi {
    async fn get_top_pairs(&self) -> FetchResult<Vec<Pair>> {
        self.get("getTopPairs", &["pairs"]).await
    }

    async fn get_weekly_top_performing_pairs(&self) -> FetchResult<Vec<MarketStats>> {
        self.get("getWeeklyTopPerformingPairs", &["pairs", "top", "weekly"])
            .await
    }

    async fn get_daily_top_performing_pairs(&self) -> FetchResult<Vec<MarketStats>> {
        self.get("getDailyTopPerformingPairs", &["pairs", "top", "daily"])
            .await
    }

    async fn get_pair_overview(&self, pair_id: &str) -> FetchResult<Pair> {
        self.get("getPairOverview", &["pairs", pair_id]).await
    }

    async fn get_market_data(&self) -> FetchResult<Vec<MarketStats>> {
        self.get("getMarketData", &["market"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_returns_data_on_success() {
        let out: FetchResult<Vec<u32>> = normalize("op", 200, br#"{"data":[1,2,3]}"#);
        assert_eq!(out.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn normalize_prefers_envelope_error() {
        let out: FetchResult<Vec<u32>> =
            normalize("op", 200, br#"{"data":[1],"error":"upstream unavailable"}"#);
        assert_eq!(out.unwrap_err().to_string(), "upstream unavailable");
    }

    #[test]
    fn normalize_maps_http_failures() {
        let out: FetchResult<Vec<u32>> = normalize("op", 502, br#"{"error":"bad gateway"}"#);
        assert_eq!(
            out.unwrap_err(),
            FetchError::Status {
                op: "op",
                status: 502,
                message: "bad gateway".into()
            }
        );

        let out: FetchResult<Vec<u32>> = normalize("op", 404, b"not found");
        assert!(matches!(out, Err(FetchError::Status { status: 404, ref message, .. }) if message == "not found"));
    }

    #[test]
    fn normalize_flags_empty_and_garbage_bodies() {
        let out: FetchResult<Vec<u32>> = normalize("op", 200, br#"{}"#);
        assert_eq!(out.unwrap_err(), FetchError::EmptyResponse { op: "op" });

        let out: FetchResult<Vec<u32>> = normalize("op", 200, b"<html>");
        assert!(matches!(out, Err(FetchError::Decode { .. })));
    }

    #[test]
    fn endpoints_extend_the_base_path() {
        let api = HttpStatsApi::new(Url::parse("http://localhost:3001/api/v1/uniswap/").unwrap())
            .unwrap();
        assert_eq!(
            api.endpoint(&["pairs", "top", "daily"]).as_str(),
            "http://localhost:3001/api/v1/uniswap/pairs/top/daily"
        );
        assert_eq!(
            api.endpoint(&["pairs", "0xabc"]).as_str(),
            "http://localhost:3001/api/v1/uniswap/pairs/0xabc"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // port 9 (discard) is closed on loopback in every sane environment
        let api = HttpStatsApi::new(Url::parse("http://127.0.0.1:9/api").unwrap()).unwrap();
        let err = api.get_market_data().await.unwrap_err();
        assert!(matches!(err, FetchError::Network { op: "getMarketData", .. }));
    }
}
