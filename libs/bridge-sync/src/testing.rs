//! Scripted in-memory chain for engine tests

use crate::client::{ChainReader, LogQuery, TransactionSender};
use crate::errors::ChainError;
use crate::types::{BlockInfo, TransactionInfo, TxReceipt};
use alloy::rpc::types::{Log, TransactionRequest};
use alloy_primitives::{address, Address, B256, U256};
use alloy_sol_types::SolEvent;
use common::interfaces::l1_bridge::IL1StandardBridge::EthDeposited;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

pub(crate) const SOURCE_CHAIN_ID: u64 = common::ETHEREUM_SEPOLIA_ID;
pub(crate) const CONTRACT: Address = address!("c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0");
pub(crate) const ALICE: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
pub(crate) const BOB: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

pub(crate) fn tx_hash(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

pub(crate) fn block_hash(number: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xb1;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

pub(crate) fn block_timestamp(number: u64) -> u64 {
    1_700_000_000 + number * 12
}

pub(crate) fn deposit_log(
    from: Address,
    to: Address,
    amount: U256,
    block_number: u64,
    hash: B256,
    log_index: u64,
) -> Log {
    let event = EthDeposited { from, to, amount };
    Log {
        inner: alloy_primitives::Log {
            address: CONTRACT,
            data: event.encode_log_data(),
        },
        block_hash: Some(block_hash(block_number)),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(hash),
        transaction_index: Some(0),
        log_index: Some(log_index),
        removed: false,
    }
}

struct MockState {
    block_number: Result<u64, String>,
    logs: Vec<Log>,
    overlap_logs: HashMap<u64, Vec<Log>>,
    failing_partitions: HashSet<u64>,
    transactions: HashMap<B256, TransactionInfo>,
    blocks: HashMap<B256, BlockInfo>,
    balances: HashMap<Address, U256>,
    balance_error: Option<String>,
    send_error: Option<String>,
    receipt: Result<bool, String>,
    receipt_gates: VecDeque<Arc<Notify>>,
    block_gates: VecDeque<Arc<Notify>>,
    sent: Vec<TransactionRequest>,
    log_queries: Vec<LogQuery>,
    block_number_calls: usize,
    calls: usize,
}

pub(crate) struct MockChain {
    chain_id: u64,
    state: Mutex<MockState>,
}

impl MockChain {
    pub(crate) fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(MockState {
                block_number: Ok(0),
                logs: Vec::new(),
                overlap_logs: HashMap::new(),
                failing_partitions: HashSet::new(),
                transactions: HashMap::new(),
                blocks: HashMap::new(),
                balances: HashMap::new(),
                balance_error: None,
                send_error: None,
                receipt: Ok(true),
                receipt_gates: VecDeque::new(),
                block_gates: VecDeque::new(),
                sent: Vec::new(),
                log_queries: Vec::new(),
                block_number_calls: 0,
                calls: 0,
            }),
        }
    }

    pub(crate) fn set_block_number(&self, number: u64) {
        self.state.lock().block_number = Ok(number);
    }

    pub(crate) fn fail_block_number(&self, reason: &str) {
        self.state.lock().block_number = Err(reason.to_string());
    }

    /// Register a deposit log together with its transaction and block
    pub(crate) fn add_deposit(
        &self,
        from: Address,
        to: Address,
        amount: U256,
        block_number: u64,
        hash: B256,
        log_index: u64,
    ) {
        let mut state = self.state.lock();
        state
            .logs
            .push(deposit_log(from, to, amount, block_number, hash, log_index));
        state.transactions.insert(
            hash,
            TransactionInfo {
                hash,
                from,
                value: amount,
            },
        );
        state.blocks.insert(
            block_hash(block_number),
            BlockInfo {
                hash: block_hash(block_number),
                number: block_number,
                timestamp: block_timestamp(block_number),
            },
        );
    }

    /// Make the endpoint also return the log of `hash` for the partition
    /// starting at `from_block`, as overlapping providers do.
    pub(crate) fn repeat_in_partition(&self, from_block: u64, hash: B256) {
        let mut state = self.state.lock();
        let log = state
            .logs
            .iter()
            .find(|log| log.transaction_hash == Some(hash))
            .cloned()
            .expect("log must be registered first");
        state.overlap_logs.entry(from_block).or_default().push(log);
    }

    pub(crate) fn fail_partition(&self, from_block: u64) {
        self.state.lock().failing_partitions.insert(from_block);
    }

    pub(crate) fn drop_block(&self, number: u64) {
        self.state.lock().blocks.remove(&block_hash(number));
    }

    pub(crate) fn drop_transaction(&self, hash: B256) {
        self.state.lock().transactions.remove(&hash);
    }

    pub(crate) fn set_balance(&self, address: Address, amount: U256) {
        self.state.lock().balances.insert(address, amount);
    }

    pub(crate) fn fail_balances(&self, reason: &str) {
        self.state.lock().balance_error = Some(reason.to_string());
    }

    pub(crate) fn fail_send(&self, reason: &str) {
        self.state.lock().send_error = Some(reason.to_string());
    }

    pub(crate) fn set_receipt(&self, receipt: Result<bool, String>) {
        self.state.lock().receipt = receipt;
    }

    /// Park the next receipt wait until the returned gate is notified.
    /// Gates are handed out to waits in call order.
    pub(crate) fn gate_next_receipt(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().receipt_gates.push_back(gate.clone());
        gate
    }

    /// Park the next block fetch until the returned gate is notified
    pub(crate) fn gate_next_block(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().block_gates.push_back(gate.clone());
        gate
    }

    /// Gates handed out but not yet reached by a call
    pub(crate) fn pending_gates(&self) -> usize {
        let state = self.state.lock();
        state.receipt_gates.len() + state.block_gates.len()
    }

    pub(crate) fn sent(&self) -> Vec<TransactionRequest> {
        self.state.lock().sent.clone()
    }

    pub(crate) fn log_queries(&self) -> Vec<LogQuery> {
        self.state.lock().log_queries.clone()
    }

    pub(crate) fn block_number_calls(&self) -> usize {
        self.state.lock().block_number_calls
    }

    /// Total number of endpoint calls of any kind
    pub(crate) fn calls(&self) -> usize {
        self.state.lock().calls
    }
}

#[async_trait::async_trait]
impl ChainReader for MockChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_block_number(&self) -> Result<u64, ChainError> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.block_number_calls += 1;
        state.block_number.clone().map_err(ChainError::RpcError)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>, ChainError> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.log_queries.push(query.clone());

        if state.failing_partitions.contains(&query.range.from) {
            return Err(ChainError::RpcError(format!(
                "block range {} unavailable",
                query.range
            )));
        }

        let mut logs: Vec<Log> = state
            .logs
            .iter()
            .filter(|log| {
                let number = log.block_number.unwrap_or_default();
                number >= query.range.from
                    && number <= query.range.to
                    && log.address() == query.address
                    && log.topics().first() == Some(&query.event_signature)
                    && query
                        .indexed
                        .map_or(true, |topic| log.topics().get(1) == Some(&topic))
            })
            .cloned()
            .collect();
        if let Some(extra) = state.overlap_logs.get(&query.range.from) {
            logs.extend(extra.iter().cloned());
        }
        Ok(logs)
    }

    async fn get_transaction(&self, hash: B256) -> Result<TransactionInfo, ChainError> {
        let mut state = self.state.lock();
        state.calls += 1;
        state
            .transactions
            .get(&hash)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("transaction {:?}", hash)))
    }

    async fn get_block(&self, hash: B256) -> Result<BlockInfo, ChainError> {
        let gate = {
            let mut state = self.state.lock();
            state.calls += 1;
            state.block_gates.pop_front()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let state = self.state.lock();
        state
            .blocks
            .get(&hash)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("block {:?}", hash)))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(reason) = &state.balance_error {
            return Err(ChainError::RpcError(reason.clone()));
        }
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl TransactionSender for MockChain {
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, ChainError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(reason) = &state.send_error {
            return Err(ChainError::RpcError(reason.clone()));
        }
        // 0xdead for the first send, then counting up
        let hash = tx_hash(0xdead + state.sent.len() as u64);
        state.sent.push(tx);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ChainError> {
        let gate = {
            let mut state = self.state.lock();
            state.calls += 1;
            state.receipt_gates.pop_front()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let state = self.state.lock();
        match &state.receipt {
            Ok(status) => Ok(TxReceipt {
                tx_hash: hash,
                block_number: 10_001,
                gas_used: 62_000,
                status: *status,
            }),
            Err(reason) => Err(ChainError::RpcError(reason.clone())),
        }
    }
}
