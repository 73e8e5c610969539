//! Live dispatch table for "state may have changed" signals.
//!
//! Each slot holds at most one re-query operation. Registering replaces the
//! previous one, firing an empty slot does nothing, and nothing is queued
//! for subscribers that register later.

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshSlot {
    Balances,
    History,
}

impl fmt::Display for RefreshSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshSlot::Balances => write!(f, "balances"),
            RefreshSlot::History => write!(f, "history"),
        }
    }
}

/// Zero-argument re-query operation
pub type RefreshOp = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
pub struct RefreshCoordinator {
    slots: RwLock<HashMap<RefreshSlot, RefreshOp>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, slot: RefreshSlot, op: RefreshOp) {
        let replaced = self.slots.write().insert(slot, op).is_some();
        tracing::debug!(%slot, replaced, "Refresh subscriber registered");
    }

    pub fn unregister(&self, slot: RefreshSlot) {
        if self.slots.write().remove(&slot).is_some() {
            tracing::debug!(%slot, "Refresh subscriber unregistered");
        }
    }

    pub fn is_registered(&self, slot: RefreshSlot) -> bool {
        self.slots.read().contains_key(&slot)
    }

    /// Run the current subscriber of `slot`, if any. Returns whether one ran.
    pub async fn fire(&self, slot: RefreshSlot) -> bool {
        let op = self.slots.read().get(&slot).cloned();
        match op {
            Some(op) => {
                tracing::debug!(%slot, "Firing refresh");
                op().await;
                true
            }
            None => {
                tracing::debug!(%slot, "No refresh subscriber, signal dropped");
                false
            }
        }
    }

    /// Fire `slot` once `delay` has elapsed unless `cancel` trips first.
    ///
    /// The subscriber is looked up when the timer expires, not when it is
    /// scheduled.
    pub fn fire_after(
        self: &Arc<Self>,
        slot: RefreshSlot,
        delay: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<bool> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => coordinator.fire(slot).await,
                _ = cancel.cancelled() => {
                    tracing::debug!(%slot, "Scheduled refresh cancelled");
                    false
                }
            }
        })
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<RefreshSlot> = self.slots.read().keys().copied().collect();
        f.debug_struct("RefreshCoordinator").field("slots", &slots).finish()
    }
}
