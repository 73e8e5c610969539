//! Views that keep a snapshot of chain state fresh while active.
//!
//! A view is refreshed on activation, whenever the session switches to
//! another address, on a fixed poll interval and whenever its slot on the
//! [`RefreshCoordinator`] fires. Every trigger goes through the same
//! `refresh`, and every refresh is tagged with a sequence number so a slow
//! response can never overwrite a newer one.

pub mod balance;
pub mod history;

use crate::errors::ViewError;
use crate::refresh::{RefreshCoordinator, RefreshOp, RefreshSlot};
use alloy_primitives::Address;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use balance::{BalanceEntry, BalanceView, Balances};
pub use history::{HistorySnapshot, HistoryView};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[async_trait::async_trait]
pub trait RefreshableView: Send + Sync + 'static {
    type Snapshot: Clone + Send + Sync;

    /// Coordinator slot this view listens on
    fn slot(&self) -> RefreshSlot;

    /// Re-query the chain and apply the result unless a newer refresh has
    /// already been applied.
    async fn refresh(&self) -> Result<Self::Snapshot, ViewError>;

    /// Last applied snapshot
    fn snapshot(&self) -> Self::Snapshot;

    /// Address changes that should trigger an immediate refresh
    fn address_changes(&self) -> Option<watch::Receiver<Option<Address>>> {
        None
    }
}

struct Versioned<T> {
    applied: u64,
    value: T,
}

/// Snapshot guarded by a monotonically increasing refresh sequence
pub struct VersionedSnapshot<T> {
    issued: AtomicU64,
    inner: RwLock<Versioned<T>>,
}

impl<T: Clone> VersionedSnapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            issued: AtomicU64::new(0),
            inner: RwLock::new(Versioned { applied: 0, value }),
        }
    }

    /// Reserve the sequence number for a refresh about to start.
    pub fn next_sequence(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> u64 {
        self.inner.read().applied
    }

    pub fn get(&self) -> T {
        self.inner.read().value.clone()
    }

    /// Apply the result of refresh `sequence`. Returns false, leaving the
    /// value untouched, when a later refresh has already been applied.
    pub fn apply(&self, sequence: u64, update: impl FnOnce(&mut T)) -> bool {
        let mut inner = self.inner.write();
        if sequence <= inner.applied {
            return false;
        }
        inner.applied = sequence;
        update(&mut inner.value);
        true
    }

    /// Change the value without consuming a sequence number.
    pub fn modify(&self, update: impl FnOnce(&mut T)) {
        update(&mut self.inner.write().value);
    }
}

/// Handle to an activated view. Deactivates on drop.
pub struct ActiveView {
    slot: RefreshSlot,
    coordinator: Arc<RefreshCoordinator>,
    cancel_token: CancellationToken,
    poll_handle: Option<JoinHandle<()>>,
}

impl ActiveView {
    pub fn slot(&self) -> RefreshSlot {
        self.slot
    }

    pub fn is_active(&self) -> bool {
        !self.cancel_token.is_cancelled()
    }

    /// Unregister from the coordinator and stop polling.
    pub async fn deactivate(mut self) {
        self.stop();
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.await;
        }
    }

    fn stop(&mut self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        self.cancel_token.cancel();
        self.coordinator.unregister(self.slot);
        tracing::debug!(slot = %self.slot, "View deactivated");
    }
}

impl Drop for ActiveView {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resolves on the next address change, or with false once the session is
/// gone. Never resolves without a subscription.
async fn address_changed(rx: &mut Option<watch::Receiver<Option<Address>>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

/// Register `view` on its coordinator slot and keep it polled every
/// `poll_interval`, starting with an immediate refresh.
pub fn activate<V: RefreshableView>(
    view: Arc<V>,
    coordinator: Arc<RefreshCoordinator>,
    poll_interval: Duration,
) -> ActiveView {
    let slot = view.slot();

    let op_view = view.clone();
    let op: RefreshOp = Arc::new(move || -> BoxFuture<'static, ()> {
        let view = op_view.clone();
        Box::pin(async move {
            if let Err(e) = view.refresh().await {
                tracing::debug!(%slot, error = %e, "Signalled refresh failed");
            }
        })
    });
    coordinator.register(slot, op);

    let cancel_token = CancellationToken::new();
    let loop_token = cancel_token.clone();
    let mut address_rx = view.address_changes();
    let poll_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = view.refresh().await {
                        tracing::debug!(%slot, error = %e, "Polled refresh failed");
                    }
                }
                changed = address_changed(&mut address_rx) => {
                    if !changed {
                        address_rx = None;
                        continue;
                    }
                    tracing::debug!(%slot, "Session address changed, refreshing");
                    if let Err(e) = view.refresh().await {
                        tracing::debug!(%slot, error = %e, "Address refresh failed");
                    }
                    interval.reset();
                }
                _ = loop_token.cancelled() => {
                    tracing::debug!(%slot, "Poll loop cancelled");
                    break;
                }
            }
        }
    });

    tracing::debug!(%slot, ?poll_interval, "View activated");
    ActiveView {
        slot,
        coordinator,
        cancel_token,
        poll_handle: Some(poll_handle),
    }
}
