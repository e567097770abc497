pub mod app_state;
pub mod logger;
pub mod pending_tx;

pub use app_state::{AppState, Flow, TopPairsSnapshot};
pub use pending_tx::PendingTxStore;
