mod bootstrap;
mod config;
mod feed;
mod market_data;
mod metrics;
mod prefetch;
mod ranking;
mod state;

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bootstrap::Bootstrap;
use config::Config;
use feed::{FeedChannel, WsTransport};
use market_data::{HttpStatsApi, StatsApi};
use prefetch::PrefetchCache;
use state::{AppState, PendingTxStore};

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// Everything runs interleaved on one thread; state is only touched between
// suspension points.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);
    if let Some(addr) = config.metrics_addr {
        crate::metrics::init_metrics_server(addr)?;
        info!(%addr, "metrics exporter listening");
    }

    info!(
        api = %config.api_base_url,
        feed = %config.ws_api_url,
        reference_pair = %config.reference_pair_id,
        "pair-stats-orchestrator starting"
    );

    let api: Arc<dyn StatsApi> = Arc::new(HttpStatsApi::new(config.api_base_url.clone())?);
    let state = AppState::new();
    let pending_tx = PendingTxStore::new();
    let prefetch = PrefetchCache::new(api.clone());
    let shutdown = CancellationToken::new();

    let mut flows = Bootstrap::new(
        api,
        state.clone(),
        Arc::new(prefetch.clone()),
        config.reference_pair_id.clone(),
    )
    .with_cancellation(shutdown.child_token())
    .launch();

    let transport = WsTransport::connect(config.ws_api_url.clone(), config.reconnect_max);
    let feed = FeedChannel::new(transport, config.feed_topics.clone(), state.clone());
    let mut feed_handle = tokio::spawn(feed.run(shutdown.child_token()));
    let mut logger_handle = tokio::spawn(state::logger::run_state_logger(
        state.clone(),
        pending_tx.handle(),
        shutdown.child_token(),
    ));

    {
        let mut flows_done = std::pin::pin!(flows.join());
        let mut bootstrapped = false;

        loop {
            tokio::select! {
                reports = &mut flows_done, if !bootstrapped => {
                    bootstrapped = true;
                    for (flow, res) in reports {
                        match res {
                            Ok(outcome) => info!(%flow, ?outcome, "bootstrap flow finished"),
                            Err(err) => error!(%flow, error = %err, "bootstrap flow panicked"),
                        }
                    }
                    info!(prefetching = prefetch.pending(), cached = prefetch.len(), "bootstrap complete");
                }
                res = &mut feed_handle => {
                    match res {
                        Ok(Ok(())) => warn!("feed channel exited"),
                        Ok(Err(err)) => warn!(error = %err, "feed channel returned error"),
                        Err(err) => error!(error = %err, "feed channel task panicked"),
                    }
                    break;
                }
                res = &mut logger_handle => {
                    match res {
                        Ok(Ok(())) => warn!("state logger exited"),
                        Ok(Err(err)) => warn!(error = %err, "state logger returned error"),
                        Err(err) => error!(error = %err, "state logger task panicked"),
                    }
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl-C, shutting down");
                    break;
                }
            }
        }
    }

    // flows still running after Ctrl-C must not publish
    flows.cancel();
    shutdown.cancel();
    drop(pending_tx);
    info!("pair-stats-orchestrator stopped");
    Ok(())
}
