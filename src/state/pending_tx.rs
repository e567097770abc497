#![allow(dead_code)]

use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Which partition of the pending set a transaction sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Approval,
    Confirm,
}

/// In-flight transaction hashes, by stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingTx {
    pub approval: Vec<String>,
    pub confirm: Vec<String>,
}

impl PendingTx {
    pub fn stage(&self, stage: Stage) -> &[String] {
        match stage {
            Stage::Approval => &self.approval,
            Stage::Confirm => &self.confirm,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut Vec<String> {
        match stage {
            Stage::Approval => &mut self.approval,
            Stage::Confirm => &mut self.confirm,
        }
    }

    pub fn contains(&self, stage: Stage, tx_id: &str) -> bool {
        self.stage(stage).iter().any(|id| id == tx_id)
    }

    pub fn is_empty(&self) -> bool {
        self.approval.is_empty() && self.confirm.is_empty()
    }

    /// Copy with `tx_id` appended. No dedup.
    pub fn with_added(&self, stage: Stage, tx_id: &str) -> Self {
        let mut next = self.clone();
        next.stage_mut(stage).push(tx_id.to_string());
        next
    }

    pub fn without(&self, stage: Stage, tx_id: &str) -> Self {
        let mut next = self.clone();
        next.stage_mut(stage).retain(|id| id != tx_id);
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pending transaction store has been torn down")]
pub struct StoreClosed;

/// Root-owned pending transaction state. Dropping it tears the state down:
/// outstanding handles start failing and subscribers see the channel close.
#[derive(Debug)]
pub struct PendingTxStore {
    tx: Arc<watch::Sender<PendingTx>>,
}

impl Default for PendingTxStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTxStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PendingTx::default());
        Self { tx: Arc::new(tx) }
    }

    /// Handle passed down to whatever needs to read or change the set.
    pub fn handle(&self) -> PendingTxHandle {
        PendingTxHandle {
            tx: Arc::downgrade(&self.tx),
        }
    }

    pub fn current(&self) -> PendingTx {
        self.tx.borrow().clone()
    }
}

/// Read/write access to the pending set.
///
/// Writes only go through [`PendingTxHandle::update`], which always sees the
/// latest value, so concurrent appends from independent call sites cannot
/// lose each other.
#[derive(Debug, Clone)]
pub struct PendingTxHandle {
    tx: Weak<watch::Sender<PendingTx>>,
}

impl PendingTxHandle {
    fn sender(&self) -> Result<Arc<watch::Sender<PendingTx>>, StoreClosed> {
        self.tx.upgrade().ok_or(StoreClosed)
    }

    pub fn current(&self) -> Result<PendingTx, StoreClosed> {
        Ok(self.sender()?.borrow().clone())
    }

    pub fn subscribe(&self) -> Result<watch::Receiver<PendingTx>, StoreClosed> {
        Ok(self.sender()?.subscribe())
    }

    /// Replaces the set with `f(latest)` and returns the new value.
    pub fn update<F>(&self, f: F) -> Result<PendingTx, StoreClosed>
    where
        F: FnOnce(&PendingTx) -> PendingTx,
    {
        let sender = self.sender()?;
        let mut next = None;
        sender.send_modify(|current| {
            *current = f(current);
            next = Some(current.clone());
        });
        Ok(next.unwrap_or_default())
    }

    pub fn add(&self, stage: Stage, tx_id: &str) -> Result<PendingTx, StoreClosed> {
        self.update(|prev| prev.with_added(stage, tx_id))
    }

    pub fn remove(&self, stage: Stage, tx_id: &str) -> Result<PendingTx, StoreClosed> {
        self.update(|prev| prev.without(stage, tx_id))
    }

    pub fn clear(&self) -> Result<PendingTx, StoreClosed> {
        self.update(|_| PendingTx::default())
    }
}
