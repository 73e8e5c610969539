//! Native balance of the connected address on every configured chain

use super::{RefreshableView, VersionedSnapshot};
use crate::client::ChainReader;
use crate::errors::ViewError;
use crate::refresh::RefreshSlot;
use crate::session::SessionProvider;
use crate::types::BalanceSnapshot;
use alloy_primitives::Address;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// One chain's row. A failing chain does not hide the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BalanceEntry {
    Loaded(BalanceSnapshot),
    #[serde(rename_all = "camelCase")]
    Failed { chain_id: u64, error: String },
}

impl BalanceEntry {
    pub fn chain_id(&self) -> u64 {
        match self {
            BalanceEntry::Loaded(snapshot) => snapshot.chain_id,
            BalanceEntry::Failed { chain_id, .. } => *chain_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub address: Option<Address>,
    pub entries: Vec<BalanceEntry>,
}

impl Balances {
    pub fn get(&self, chain_id: u64) -> Option<&BalanceEntry> {
        self.entries.iter().find(|entry| entry.chain_id() == chain_id)
    }
}

pub struct BalanceView {
    session: Arc<dyn SessionProvider>,
    readers: Vec<Arc<dyn ChainReader>>,
    snapshot: VersionedSnapshot<Balances>,
}

impl BalanceView {
    /// `readers` are queried in order and keep that order in the snapshot.
    pub fn new(session: Arc<dyn SessionProvider>, readers: Vec<Arc<dyn ChainReader>>) -> Self {
        Self {
            session,
            readers,
            snapshot: VersionedSnapshot::new(Balances::default()),
        }
    }

    async fn fetch(reader: &dyn ChainReader, address: Address) -> BalanceEntry {
        let chain_id = reader.chain_id();
        match reader.get_balance(address).await {
            Ok(amount) => BalanceEntry::Loaded(BalanceSnapshot {
                chain_id,
                amount,
                as_of: Utc::now(),
            }),
            Err(e) => {
                tracing::warn!(chain_id, %address, error = %e, "Failed to fetch balance");
                BalanceEntry::Failed {
                    chain_id,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl RefreshableView for BalanceView {
    type Snapshot = Balances;

    fn slot(&self) -> RefreshSlot {
        RefreshSlot::Balances
    }

    async fn refresh(&self) -> Result<Balances, ViewError> {
        let sequence = self.snapshot.next_sequence();

        let Some(address) = self.session.address() else {
            self.snapshot.apply(sequence, |balances| *balances = Balances::default());
            return Err(ViewError::NotConnected);
        };

        let entries = join_all(
            self.readers
                .iter()
                .map(|reader| Self::fetch(reader.as_ref(), address)),
        )
        .await;

        let fresh = Balances {
            address: Some(address),
            entries,
        };
        if !self.snapshot.apply(sequence, |balances| *balances = fresh.clone()) {
            tracing::debug!(sequence, "Discarding stale balance refresh");
        }
        Ok(self.snapshot.get())
    }

    fn snapshot(&self) -> Balances {
        self.snapshot.get()
    }

    fn address_changes(&self) -> Option<watch::Receiver<Option<Address>>> {
        self.session.subscribe_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticSession;
    use crate::testing::*;
    use alloy_primitives::U256;
    use common::RISE_SEPOLIA_ID;

    fn setup() -> (Arc<MockChain>, Arc<MockChain>, Arc<StaticSession>, BalanceView) {
        let source = Arc::new(MockChain::new(SOURCE_CHAIN_ID));
        let destination = Arc::new(MockChain::new(RISE_SEPOLIA_ID));
        let session = Arc::new(StaticSession::connected(ALICE, SOURCE_CHAIN_ID));
        let view = BalanceView::new(
            session.clone(),
            vec![source.clone() as Arc<dyn ChainReader>, destination.clone()],
        );
        (source, destination, session, view)
    }

    #[tokio::test]
    async fn test_refresh_loads_every_chain() {
        let (source, destination, _session, view) = setup();
        source.set_balance(ALICE, U256::from(3_000_000_000_000_000_000u128));
        destination.set_balance(ALICE, U256::from(250_000_000_000_000_000u128));

        let balances = view.refresh().await.unwrap();
        assert_eq!(balances.address, Some(ALICE));
        assert_eq!(balances.entries.len(), 2);

        match balances.get(SOURCE_CHAIN_ID) {
            Some(BalanceEntry::Loaded(snapshot)) => assert_eq!(snapshot.amount_ether(), "3.0000"),
            other => panic!("unexpected entry {:?}", other),
        }
        match balances.get(RISE_SEPOLIA_ID) {
            Some(BalanceEntry::Loaded(snapshot)) => assert_eq!(snapshot.amount_ether(), "0.2500"),
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(view.snapshot(), balances);
    }

    #[tokio::test]
    async fn test_one_failing_chain_keeps_the_other() {
        let (source, destination, _session, view) = setup();
        source.set_balance(ALICE, U256::from(1u64));
        destination.fail_balances("rate limited");

        let balances = view.refresh().await.unwrap();
        assert!(matches!(balances.get(SOURCE_CHAIN_ID), Some(BalanceEntry::Loaded(_))));
        assert_eq!(
            balances.get(RISE_SEPOLIA_ID),
            Some(&BalanceEntry::Failed {
                chain_id: RISE_SEPOLIA_ID,
                error: "RPC error: rate limited".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_disconnect_clears_entries() {
        let (source, _destination, session, view) = setup();
        source.set_balance(ALICE, U256::from(1u64));
        view.refresh().await.unwrap();

        session.disconnect();
        assert_eq!(view.refresh().await.unwrap_err(), ViewError::NotConnected);
        assert_eq!(view.snapshot(), Balances::default());
        assert_eq!(source.calls(), 1);
    }
}
