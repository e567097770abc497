use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::app_state::{AppState, MainContent};
use super::pending_tx::PendingTxHandle;

/// Logs every state publication. Stands in for the view layer when the
/// orchestrator runs headless.
pub async fn run_state_logger(
    state: AppState,
    pending: PendingTxHandle,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut all_pairs = state.subscribe_all_pairs();
    let mut top_pairs = state.subscribe_top_pairs();
    let mut market_data = state.subscribe_market_data();
    let mut gas_prices = state.subscribe_gas_prices();
    let mut error = state.subscribe_error();
    let mut pending_rx = pending.subscribe()?;

    info!("state logger started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Ok(()) = all_pairs.changed() => {
                let snapshot = all_pairs.borrow_and_update().clone();
                let count = snapshot.set.as_ref().map_or(0, |set| set.len());
                let leader = snapshot
                    .set
                    .as_ref()
                    .and_then(|set| set.pairs.first().map(|view| view.readable()));
                info!(pairs = count, ?leader, "all pairs published");
            }
            Ok(()) = top_pairs.changed() => {
                let top = top_pairs.borrow_and_update().clone();
                if let Some(top) = top {
                    info!(daily = top.daily.len(), weekly = top.weekly.len(), "top pairs published");
                }
            }
            Ok(()) = market_data.changed() => {
                let stats = market_data.borrow_and_update().clone();
                if let Some(stats) = stats {
                    info!(markets = stats.len(), "market data published");
                }
            }
            Ok(()) = gas_prices.changed() => {
                let gas = *gas_prices.borrow_and_update();
                if let Some(gas) = gas {
                    info!(standard = gas.standard, fast = gas.fast, faster = gas.faster, "gas prices updated");
                }
            }
            Ok(()) = error.changed() => {
                let _ = error.borrow_and_update();
                if let MainContent::Error(err) = state.main_content() {
                    warn!(flow = %err.flow, message = %err.message, "main content replaced by error view");
                }
            }
            Ok(()) = pending_rx.changed() => {
                let pending = pending_rx.borrow_and_update().clone();
                info!(approval = ?pending.approval, confirm = ?pending.confirm, "pending transactions changed");
            }
            else => break,
        }
    }

    info!("state logger stopped");
    Ok(())
}
