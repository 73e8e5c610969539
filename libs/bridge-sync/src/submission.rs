//! Outbound deposit lifecycle.
//!
//! One call to [`SubmissionTracker::submit`] broadcasts exactly one
//! transaction and walks it through
//! `Idle -> AwaitingSignature -> Pending -> Confirming -> Confirmed | Failed`.
//! Broadcast failures are never retried. On confirmation the balances and
//! history views are told to refresh after a delay, since indexers lag
//! behind block confirmation.

use crate::client::TransactionSender;
use crate::errors::SubmissionError;
use crate::refresh::{RefreshCoordinator, RefreshSlot};
use crate::session::SessionProvider;
use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use common::amount::parse_ether_amount;
use common::interfaces::l1_bridge::{IL1StandardBridge, DEFAULT_MIN_GAS_LIMIT};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    AwaitingSignature,
    Pending(B256),
    Confirming(B256),
    Confirmed(B256),
    Failed(SubmissionError),
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Confirmed(_) | SubmissionState::Failed(_))
    }

    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            SubmissionState::Pending(hash)
            | SubmissionState::Confirming(hash)
            | SubmissionState::Confirmed(hash) => Some(*hash),
            _ => None,
        }
    }

    /// Whether `next` may follow `self`. `Idle` is reachable from anywhere
    /// through an explicit reset.
    pub fn can_transition_to(&self, next: &SubmissionState) -> bool {
        use SubmissionState::*;
        match (self, next) {
            (_, Idle) => true,
            (Idle, AwaitingSignature) => true,
            (AwaitingSignature, Pending(_)) | (AwaitingSignature, Failed(_)) => true,
            (Pending(a), Confirming(b)) => a == b,
            (Confirming(a), Confirmed(b)) => a == b,
            (Confirming(_), Failed(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "Idle"),
            SubmissionState::AwaitingSignature => write!(f, "AwaitingSignature"),
            SubmissionState::Pending(hash) => write!(f, "Pending({:?})", hash),
            SubmissionState::Confirming(hash) => write!(f, "Confirming({:?})", hash),
            SubmissionState::Confirmed(hash) => write!(f, "Confirmed({:?})", hash),
            SubmissionState::Failed(e) => write!(f, "Failed({})", e),
        }
    }
}

/// The two payable bridge entry points, chosen once when the call is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositRequest {
    /// `depositETH(minGasLimit)`, credits the sender on the destination chain
    ToSelf { value: U256, min_gas_limit: u32 },
    /// `depositETHTo(to, minGasLimit)`
    ToRecipient {
        recipient: Address,
        value: U256,
        min_gas_limit: u32,
    },
}

impl DepositRequest {
    /// A recipient that is absent or equal to the sender is a self-transfer.
    pub fn new(sender: Address, recipient: Option<Address>, value: U256, min_gas_limit: u32) -> Self {
        match recipient {
            Some(recipient) if recipient != sender => DepositRequest::ToRecipient {
                recipient,
                value,
                min_gas_limit,
            },
            _ => DepositRequest::ToSelf {
                value,
                min_gas_limit,
            },
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            DepositRequest::ToSelf { value, .. } | DepositRequest::ToRecipient { value, .. } => {
                *value
            }
        }
    }

    pub fn min_gas_limit(&self) -> u32 {
        match self {
            DepositRequest::ToSelf { min_gas_limit, .. }
            | DepositRequest::ToRecipient { min_gas_limit, .. } => *min_gas_limit,
        }
    }

    pub fn calldata(&self) -> Bytes {
        match self {
            DepositRequest::ToSelf { min_gas_limit, .. } => IL1StandardBridge::depositETHCall {
                minGasLimit: *min_gas_limit,
            }
            .abi_encode()
            .into(),
            DepositRequest::ToRecipient {
                recipient,
                min_gas_limit,
                ..
            } => IL1StandardBridge::depositETHToCall {
                to: *recipient,
                minGasLimit: *min_gas_limit,
            }
            .abi_encode()
            .into(),
        }
    }

    pub fn to_transaction(&self, contract: Address, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .from(from)
            .to(contract)
            .value(self.value())
            .input(self.calldata().into())
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub source_chain_id: u64,
    pub contract: Address,
    pub default_min_gas_limit: u32,
    pub balances_delay: Duration,
    pub history_delay: Duration,
}

impl SubmissionConfig {
    pub fn new(source_chain_id: u64, contract: Address) -> Self {
        Self {
            source_chain_id,
            contract,
            default_min_gas_limit: DEFAULT_MIN_GAS_LIMIT,
            balances_delay: Duration::from_secs(2),
            history_delay: Duration::from_secs(3),
        }
    }
}

/// Drives deposits through their lifecycle and owns the current state
pub struct SubmissionTracker {
    config: SubmissionConfig,
    session: Arc<dyn SessionProvider>,
    sender: Arc<dyn TransactionSender>,
    coordinator: Arc<RefreshCoordinator>,
    state: watch::Sender<SubmissionState>,
    /// Bumped by every submit and reset so superseded drives stop
    /// publishing into `state`. Only modified while holding the watch lock.
    generation: AtomicU64,
    cancel_token: CancellationToken,
}

impl SubmissionTracker {
    pub fn new(
        config: SubmissionConfig,
        session: Arc<dyn SessionProvider>,
        sender: Arc<dyn TransactionSender>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Arc::new(Self {
            config,
            session,
            sender,
            coordinator,
            state,
            generation: AtomicU64::new(0),
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// Validate input and build the call without touching the chain.
    pub fn prepare(
        &self,
        amount: &str,
        recipient: Option<&str>,
        min_gas_limit: Option<u32>,
    ) -> Result<(Address, DepositRequest), SubmissionError> {
        let sender = self.session.address().ok_or(SubmissionError::NotConnected)?;
        let value = parse_ether_amount(amount)?;

        let chain_id = self.session.chain_id();
        if chain_id != Some(self.config.source_chain_id) {
            return Err(SubmissionError::WrongNetwork {
                expected: self.config.source_chain_id,
                actual: chain_id,
            });
        }

        let recipient = match recipient.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(
                raw.parse::<Address>()
                    .map_err(|_| SubmissionError::InvalidRecipient(raw.to_string()))?,
            ),
            None => None,
        };

        let min_gas_limit = min_gas_limit.unwrap_or(self.config.default_min_gas_limit);
        Ok((sender, DepositRequest::new(sender, recipient, value, min_gas_limit)))
    }

    /// Start one deposit. Precondition failures return immediately with no
    /// chain contact; otherwise every state of this submission is streamed
    /// on the returned receiver, which closes after the terminal state.
    pub fn submit(
        self: &Arc<Self>,
        amount: &str,
        recipient: Option<&str>,
        min_gas_limit: Option<u32>,
    ) -> Result<mpsc::UnboundedReceiver<SubmissionState>, SubmissionError> {
        let (sender, request) = self.prepare(amount, recipient, min_gas_limit)?;

        let current = self.state();
        if !current.is_terminal() && current != SubmissionState::Idle {
            tracing::warn!(state = %current, "Starting a deposit while another is in flight");
        }
        let generation = self.supersede();

        let (updates, receiver) = mpsc::unbounded_channel();
        let tracker = self.clone();
        tokio::spawn(async move {
            tracker.execute(generation, sender, request, updates).await;
        });
        Ok(receiver)
    }

    /// Clear the last result. Already scheduled refreshes still fire.
    pub fn reset(&self) {
        self.supersede();
    }

    /// Cancel pending delayed refreshes; used on teardown.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    async fn execute(
        &self,
        generation: u64,
        sender: Address,
        request: DepositRequest,
        updates: mpsc::UnboundedSender<SubmissionState>,
    ) -> SubmissionState {
        tracing::info!(
            %sender,
            value = %request.value(),
            min_gas_limit = request.min_gas_limit(),
            third_party = matches!(request, DepositRequest::ToRecipient { .. }),
            "Submitting deposit"
        );

        self.publish(generation, &updates, SubmissionState::AwaitingSignature);

        let tx = request.to_transaction(self.config.contract, sender);
        let tx_hash = match self.sender.send_transaction(tx).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(error = %e, "Deposit broadcast failed");
                let failed = SubmissionState::Failed(SubmissionError::BroadcastFailure(e.to_string()));
                self.publish(generation, &updates, failed.clone());
                return failed;
            }
        };

        self.publish(generation, &updates, SubmissionState::Pending(tx_hash));
        self.publish(generation, &updates, SubmissionState::Confirming(tx_hash));

        let terminal = match self.sender.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.status => {
                tracing::info!(?tx_hash, block = receipt.block_number, gas_used = receipt.gas_used, "Deposit confirmed");
                self.schedule_refreshes();
                SubmissionState::Confirmed(tx_hash)
            }
            Ok(receipt) => {
                tracing::error!(?tx_hash, block = receipt.block_number, "Deposit reverted");
                SubmissionState::Failed(SubmissionError::ConfirmationFailure(format!(
                    "Transaction {:?} reverted",
                    tx_hash
                )))
            }
            Err(e) => {
                tracing::error!(?tx_hash, error = %e, "Failed to obtain deposit receipt");
                SubmissionState::Failed(SubmissionError::ConfirmationFailure(e.to_string()))
            }
        };

        self.publish(generation, &updates, terminal.clone());
        terminal
    }

    fn publish(
        &self,
        generation: u64,
        updates: &mpsc::UnboundedSender<SubmissionState>,
        next: SubmissionState,
    ) {
        let _ = updates.send(next.clone());

        // Checked under the watch lock, which `supersede` also holds while
        // bumping the generation
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!(state = %next, "Superseded submission, not publishing");
                return false;
            }
            if !current.can_transition_to(&next) {
                tracing::warn!(from = %current, to = %next, "Rejected submission state transition");
                return false;
            }
            *current = next;
            true
        });
    }

    /// Detach any running drive from the shared state and return to `Idle`.
    /// Returns the generation owned by the next drive.
    fn supersede(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|current| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *current = SubmissionState::Idle;
        });
        generation
    }

    fn schedule_refreshes(&self) {
        self.coordinator.fire_after(
            RefreshSlot::Balances,
            self.config.balances_delay,
            self.cancel_token.clone(),
        );
        self.coordinator.fire_after(
            RefreshSlot::History,
            self.config.history_delay,
            self.cancel_token.clone(),
        );
    }
}
