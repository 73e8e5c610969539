//! Wallet session seam: who is connected, and to which chain.

use alloy_primitives::Address;
use parking_lot::RwLock;
use tokio::sync::watch;

pub trait SessionProvider: Send + Sync {
    fn address(&self) -> Option<Address>;

    fn chain_id(&self) -> Option<u64>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }

    /// Notified whenever the connected address changes. Providers that never
    /// change address may return `None`.
    fn subscribe_address(&self) -> Option<watch::Receiver<Option<Address>>> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SessionState {
    address: Option<Address>,
    chain_id: Option<u64>,
}

/// In-memory session, updated explicitly by whoever owns the wallet
#[derive(Debug)]
pub struct StaticSession {
    state: RwLock<SessionState>,
    address_tx: watch::Sender<Option<Address>>,
}

impl Default for StaticSession {
    fn default() -> Self {
        Self::with_state(SessionState::default())
    }
}

impl StaticSession {
    fn with_state(state: SessionState) -> Self {
        let (address_tx, _) = watch::channel(state.address);
        Self {
            state: RwLock::new(state),
            address_tx,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(address: Address, chain_id: u64) -> Self {
        Self::with_state(SessionState {
            address: Some(address),
            chain_id: Some(chain_id),
        })
    }

    pub fn connect(&self, address: Address, chain_id: u64) {
        *self.state.write() = SessionState {
            address: Some(address),
            chain_id: Some(chain_id),
        };
        self.publish_address(Some(address));
        tracing::info!(%address, chain_id, "Session connected");
    }

    pub fn disconnect(&self) {
        *self.state.write() = SessionState::default();
        self.publish_address(None);
        tracing::info!("Session disconnected");
    }

    /// Only a different address wakes subscribers
    fn publish_address(&self, address: Option<Address>) {
        self.address_tx.send_if_modified(|current| {
            if *current == address {
                return false;
            }
            *current = address;
            true
        });
    }

    pub fn switch_chain(&self, chain_id: u64) {
        let mut state = self.state.write();
        if state.address.is_some() {
            state.chain_id = Some(chain_id);
            tracing::info!(chain_id, "Session switched chain");
        }
    }
}

impl SessionProvider for StaticSession {
    fn address(&self) -> Option<Address> {
        self.state.read().address
    }

    fn chain_id(&self) -> Option<u64> {
        self.state.read().chain_id
    }

    fn subscribe_address(&self) -> Option<watch::Receiver<Option<Address>>> {
        Some(self.address_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let session = StaticSession::disconnected();
        assert!(!session.is_connected());

        session.switch_chain(5);
        assert_eq!(session.chain_id(), None);

        let address = Address::repeat_byte(0xaa);
        session.connect(address, 1);
        assert_eq!(session.address(), Some(address));

        session.switch_chain(5);
        assert_eq!(session.chain_id(), Some(5));

        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(session.chain_id(), None);
    }

    #[test]
    fn test_address_subscribers_see_only_address_changes() {
        let alice = Address::repeat_byte(0xaa);
        let bob = Address::repeat_byte(0xbb);
        let session = StaticSession::connected(alice, 1);
        let mut rx = session.subscribe_address().unwrap();
        assert_eq!(*rx.borrow(), Some(alice));

        // Same address on another chain is not an address change
        session.connect(alice, 5);
        assert!(!rx.has_changed().unwrap());

        session.connect(bob, 5);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(bob));

        session.disconnect();
        assert_eq!(*rx.borrow_and_update(), None);
    }
}
