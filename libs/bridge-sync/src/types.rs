use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, TimeZone, Utc};
use common::amount::format_ether_fixed;
use common::Chain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive block interval used for one log range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Confirmed,
}

/// One historical deposit, materialized from an `EthDeposited` log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub tx_hash: B256,
    pub block_hash: B256,
    pub sender: Address,
    pub recipient: Address,
    /// Wei, as a base-10 string
    pub amount: String,
    pub block_number: u64,
    pub log_index: u64,
    /// Epoch milliseconds of the including block
    pub timestamp_ms: u64,
    pub status: TransferStatus,
}

impl TransferRecord {
    /// `None` if `amount` is not a base-10 integer, which only happens for
    /// records deserialized from elsewhere; the scanner builds it from a `U256`.
    pub fn amount_wei(&self) -> Option<U256> {
        U256::from_str_radix(&self.amount, 10).ok()
    }

    pub fn amount_ether(&self) -> Option<String> {
        self.amount_wei().map(|wei| format_ether_fixed(wei, 4))
    }

    pub fn is_self_transfer(&self) -> bool {
        self.sender == self.recipient
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms as i64).single()
    }

    pub fn explorer_url(&self, chain: &Chain) -> String {
        chain.tx_url(&format!("{:?}", self.tx_hash))
    }
}

impl fmt::Display for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} at block {} ({:?})",
            self.amount_ether()
                .map(|ether| format!("{} ETH", ether))
                .unwrap_or_else(|| format!("{} (unparsed)", self.amount)),
            self.sender,
            self.block_number,
            self.tx_hash
        )?;
        if !self.is_self_transfer() {
            write!(f, " to {}", self.recipient)?;
        }
        Ok(())
    }
}

/// Latest known native balance on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub chain_id: u64,
    pub amount: U256,
    pub as_of: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn amount_ether(&self) -> String {
        format_ether_fixed(self.amount, 4)
    }
}

/// Subset of a transaction needed to materialize a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: B256,
    pub from: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub hash: B256,
    pub number: u64,
    /// Seconds since epoch
    pub timestamp: u64,
}

/// Transaction receipt information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub status: bool,
}
