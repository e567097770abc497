use serde::Serialize;
use serde_json::Value;

use crate::market_data::types::GasPrices;

pub const GAS_PRICE_TOPIC: &str = "ethGas:getGasPrices";

/// Outbound control frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ControlMessage {
    Subscribe { topics: Vec<String> },
}

/// Inbound frame, demultiplexed by its `topic` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    GasPrices(GasPrices),
    /// Tagged, but with a topic nothing here consumes.
    Unknown { topic: String },
    /// JSON without a string `topic`.
    Untagged,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed payload for topic {topic}: {source}")]
    Payload {
        topic: String,
        source: serde_json::Error,
    },
}

impl FeedUpdate {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let mut frame: Value = serde_json::from_str(text)?;

        let Some(topic) = frame.get("topic").and_then(Value::as_str) else {
            return Ok(FeedUpdate::Untagged);
        };
        let topic = topic.to_string();

        // topics may carry a suffix (e.g. a network qualifier), match on prefix
        if topic.starts_with(GAS_PRICE_TOPIC) {
            let data = frame.get_mut("data").map(Value::take).unwrap_or(Value::Null);
            return serde_json::from_value(data)
                .map(FeedUpdate::GasPrices)
                .map_err(|source| DecodeError::Payload { topic, source });
        }

        Ok(FeedUpdate::Unknown { topic })
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedUpdate::GasPrices(_) => "gas_prices",
            FeedUpdate::Unknown { .. } => "unknown",
            FeedUpdate::Untagged => "untagged",
        }
    }
}
