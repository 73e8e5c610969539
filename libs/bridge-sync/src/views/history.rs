//! Recent outbound deposits of the connected address

use super::{RefreshableView, VersionedSnapshot};
use crate::errors::ViewError;
use crate::history::HistoryScanner;
use crate::refresh::RefreshSlot;
use crate::session::SessionProvider;
use crate::types::TransferRecord;
use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub address: Option<Address>,
    pub records: Vec<TransferRecord>,
    /// Message of the last failed refresh, cleared by the next success
    pub error: Option<String>,
    pub loading: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct HistoryView {
    session: Arc<dyn SessionProvider>,
    scanner: HistoryScanner,
    snapshot: VersionedSnapshot<HistorySnapshot>,
}

impl HistoryView {
    pub fn new(session: Arc<dyn SessionProvider>, scanner: HistoryScanner) -> Self {
        Self {
            session,
            scanner,
            snapshot: VersionedSnapshot::new(HistorySnapshot::default()),
        }
    }
}

#[async_trait::async_trait]
impl RefreshableView for HistoryView {
    type Snapshot = HistorySnapshot;

    fn slot(&self) -> RefreshSlot {
        RefreshSlot::History
    }

    async fn refresh(&self) -> Result<HistorySnapshot, ViewError> {
        let sequence = self.snapshot.next_sequence();

        let Some(address) = self.session.address() else {
            self.snapshot
                .apply(sequence, |snapshot| *snapshot = HistorySnapshot::default());
            return Err(ViewError::NotConnected);
        };

        self.snapshot.modify(|snapshot| {
            if snapshot.address != Some(address) {
                *snapshot = HistorySnapshot {
                    address: Some(address),
                    ..Default::default()
                };
            }
            snapshot.loading = true;
        });

        let outcome = self.scanner.history(address).await;
        // Another refresh issued after this one is still running
        let loading = self.snapshot.latest_issued() > sequence;

        let applied = match &outcome {
            Ok(records) => self.snapshot.apply(sequence, |snapshot| {
                *snapshot = HistorySnapshot {
                    address: Some(address),
                    records: records.clone(),
                    error: None,
                    loading,
                    last_updated: Some(Utc::now()),
                };
            }),
            Err(e) => self.snapshot.apply(sequence, |snapshot| {
                if snapshot.address != Some(address) {
                    snapshot.records.clear();
                }
                snapshot.address = Some(address);
                snapshot.error = Some(e.to_string());
                snapshot.loading = loading;
            }),
        };
        if !applied {
            tracing::debug!(sequence, %address, "Discarding stale history refresh");
        }

        outcome?;
        Ok(self.snapshot.get())
    }

    fn snapshot(&self) -> HistorySnapshot {
        self.snapshot.get()
    }

    fn address_changes(&self) -> Option<watch::Receiver<Option<Address>>> {
        self.session.subscribe_address()
    }
}
