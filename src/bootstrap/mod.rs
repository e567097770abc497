use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::market_data::client::{FetchError, FetchResult, StatsApi};
use crate::metrics::prometheus::record_flow;
use crate::prefetch::{PrefetchSink, select_prefetch_targets};
use crate::ranking::calculate_pair_rankings;
use crate::state::{AppState, Flow, TopPairsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Published,
    Failed,
    /// Cancelled before anything was published.
    Cancelled,
}

impl FlowOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            FlowOutcome::Published => "published",
            FlowOutcome::Failed => "failed",
            FlowOutcome::Cancelled => "cancelled",
        }
    }
}

/// Startup data acquisition.
///
/// Runs three independent flows: all pairs, top pairs (with prefetch), and
/// market data. A failing flow writes the shared error slot and leaves its
/// own slice untouched; the other flows carry on.
#[derive(Clone)]
pub struct Bootstrap {
    api: Arc<dyn StatsApi>,
    state: AppState,
    prefetch: Arc<dyn PrefetchSink>,
    reference_pair_id: String,
    cancel: CancellationToken,
}

impl Bootstrap {
    pub fn new(
        api: Arc<dyn StatsApi>,
        state: AppState,
        prefetch: Arc<dyn PrefetchSink>,
        reference_pair_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            state,
            prefetch,
            reference_pair_id: reference_pair_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawns all three flows without waiting on any of them.
    pub fn launch(&self) -> BootstrapHandle {
        let all_pairs = self.clone();
        let top_pairs = self.clone();
        let market_data = self.clone();

        BootstrapHandle {
            cancel: self.cancel.clone(),
            tasks: vec![
                (
                    Flow::AllPairs,
                    tokio::spawn(async move { all_pairs.run_all_pairs().await }),
                ),
                (
                    Flow::TopPairs,
                    tokio::spawn(async move { top_pairs.run_top_pairs().await }),
                ),
                (
                    Flow::MarketData,
                    tokio::spawn(async move { market_data.run_market_data().await }),
                ),
            ],
        }
    }

    /// Awaits `fut` unless cancelled first. `None` means nothing may be
    /// published.
    async fn fetch<T>(&self, fut: impl Future<Output = FetchResult<T>>) -> Option<FetchResult<T>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = fut => (!self.cancel.is_cancelled()).then_some(result),
        }
    }

    fn fail(&self, flow: Flow, context: &str, err: FetchError) -> FlowOutcome {
        warn!(flow = %flow, error = %err, "{context}");
        self.state.publish_error(flow, err.to_string());
        FlowOutcome::Failed
    }

    fn finish(&self, flow: Flow, outcome: FlowOutcome) -> FlowOutcome {
        record_flow(flow.as_str(), outcome.as_str());
        debug!(flow = %flow, outcome = outcome.as_str(), "flow finished");
        outcome
    }

    pub async fn run_all_pairs(&self) -> FlowOutcome {
        let flow = Flow::AllPairs;
        let outcome = match self.fetch(self.api.get_top_pairs()).await {
            None => FlowOutcome::Cancelled,
            Some(Err(err)) => self.fail(flow, "could not fetch top pairs", err),
            Some(Ok(raw)) => {
                let ranked = calculate_pair_rankings(raw);
                info!(pairs = ranked.len(), "pair rankings computed");
                self.state.publish_all_pairs(ranked);
                FlowOutcome::Published
            }
        };
        self.finish(flow, outcome)
    }

    pub async fn run_top_pairs(&self) -> FlowOutcome {
        let flow = Flow::TopPairs;
        let api = &self.api;
        let joined = self
            .fetch(async {
                let (weekly, daily, reference) = futures::join!(
                    api.get_weekly_top_performing_pairs(),
                    api.get_daily_top_performing_pairs(),
                    api.get_pair_overview(&self.reference_pair_id),
                );
                // weekly, then daily, then the reference pair decides the error
                Ok::<_, FetchError>((weekly?, daily?, reference?))
            })
            .await;

        let outcome = match joined {
            None => FlowOutcome::Cancelled,
            Some(Err(err)) => self.fail(flow, "could not fetch top pairs data", err),
            Some(Ok((weekly, daily, reference))) => {
                let targets = select_prefetch_targets(&daily, &weekly, &reference);
                info!(
                    daily = daily.len(),
                    weekly = weekly.len(),
                    prefetch = targets.len(),
                    "top pairs fetched"
                );
                self.state.publish_top_pairs(TopPairsSnapshot { daily, weekly });
                self.prefetch.prefetch(targets);
                FlowOutcome::Published
            }
        };
        self.finish(flow, outcome)
    }

    pub async fn run_market_data(&self) -> FlowOutcome {
        let flow = Flow::MarketData;
        let outcome = match self.fetch(self.api.get_market_data()).await {
            None => FlowOutcome::Cancelled,
            Some(Err(err)) => self.fail(flow, "could not fetch market data", err),
            Some(Ok(stats)) => {
                info!(markets = stats.len(), "market data fetched");
                self.state.publish_market_data(stats);
                FlowOutcome::Published
            }
        };
        self.finish(flow, outcome)
    }
}

/// Running bootstrap flows.
pub struct BootstrapHandle {
    cancel: CancellationToken,
    tasks: Vec<(Flow, JoinHandle<FlowOutcome>)>,
}

impl BootstrapHandle {
    /// Stops every flow that has not published yet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for every flow. A panicking flow shows up as a `JoinError`
    /// without affecting the others. The handle stays usable for `cancel`.
    pub async fn join(&mut self) -> Vec<(Flow, Result<FlowOutcome, JoinError>)> {
        let (flows, handles): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks).into_iter().unzip();
        flows
            .into_iter()
            .zip(futures::future::join_all(handles).await)
            .collect()
    }
}
