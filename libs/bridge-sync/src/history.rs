//! Historical deposit reconstruction from `EthDeposited` logs.
//!
//! The look-back window is split into partitions small enough for providers
//! that cap `eth_getLogs` ranges (Alchemy rejects more than 500 blocks).
//! Partitions are queried one after another in ascending order; a failed
//! partition is skipped. Matched logs are then resolved concurrently into
//! [`TransferRecord`]s, deduplicated by transaction hash and ordered newest
//! first.

use crate::client::{ChainReader, LogQuery};
use crate::errors::{ChainError, HistoryError};
use crate::types::{BlockRange, TransferRecord, TransferStatus};
use alloy::rpc::types::Log;
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolEvent;
use common::interfaces::l1_bridge::IL1StandardBridge::EthDeposited;
use futures_util::future::{join_all, try_join};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 2000;
pub const DEFAULT_PARTITION_SIZE: u64 = 450;
pub const DEFAULT_MAX_RECORDS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Bridge contract emitting `EthDeposited`
    pub contract: Address,
    pub lookback_blocks: u64,
    pub partition_size: u64,
    pub max_records: usize,
}

impl HistoryConfig {
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            lookback_blocks: DEFAULT_LOOKBACK_BLOCKS,
            partition_size: DEFAULT_PARTITION_SIZE,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }

    pub fn with_lookback_blocks(mut self, blocks: u64) -> Self {
        self.lookback_blocks = blocks;
        self
    }

    pub fn with_partition_size(mut self, size: u64) -> Self {
        self.partition_size = size.max(1);
        self
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }
}

/// Split `[start, latest]` into consecutive ranges of at most `size` blocks.
///
/// The last range is truncated to `latest`. Returns nothing when
/// `start > latest`.
pub fn partition_range(start: u64, latest: u64, size: u64) -> Vec<BlockRange> {
    let size = size.max(1);
    let mut ranges = Vec::new();
    let mut from = start;

    while from <= latest {
        let to = from.saturating_add(size - 1).min(latest);
        ranges.push(BlockRange::new(from, to));
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }

    ranges
}

/// Deduplicate by transaction hash, order by block (then log index)
/// descending and keep the newest `max_records`.
pub fn reconcile(records: Vec<TransferRecord>, max_records: usize) -> Vec<TransferRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique: Vec<TransferRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.tx_hash))
        .collect();

    unique.sort_by(|a, b| {
        b.block_number
            .cmp(&a.block_number)
            .then(b.log_index.cmp(&a.log_index))
    });
    unique.truncate(max_records);
    unique
}

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub latest_block: u64,
    pub start_block: u64,
    pub partitions: usize,
    pub failed_partitions: Vec<BlockRange>,
    pub logs_matched: usize,
    pub duplicates: usize,
    pub dropped_records: usize,
    pub records: usize,
    pub elapsed_ms: u128,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.failed_partitions.is_empty() && self.dropped_records == 0
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scan[blocks={}..={}, partitions={}, failed={}, logs={}, duplicates={}, dropped={}, records={}, elapsed_ms={}]",
            self.start_block,
            self.latest_block,
            self.partitions,
            self.failed_partitions.len(),
            self.logs_matched,
            self.duplicates,
            self.dropped_records,
            self.records,
            self.elapsed_ms
        )?;
        if !self.is_complete() {
            write!(f, " (PARTIAL)")?;
        }
        Ok(())
    }
}

/// Rebuilds the deposit history of an address from source-chain logs
pub struct HistoryScanner {
    reader: Arc<dyn ChainReader>,
    config: HistoryConfig,
}

impl HistoryScanner {
    pub fn new(reader: Arc<dyn ChainReader>, config: HistoryConfig) -> Self {
        Self { reader, config }
    }

    /// Newest-first deposits sent by `address` within the look-back window.
    ///
    /// Only a failure to read the current block height is an error; every
    /// other failure shrinks the result instead.
    pub async fn history(&self, address: Address) -> Result<Vec<TransferRecord>, HistoryError> {
        self.scan(address).await.map(|(records, _)| records)
    }

    /// Same as [`history`](Self::history), also returning pass counters.
    pub async fn scan(
        &self,
        address: Address,
    ) -> Result<(Vec<TransferRecord>, ScanReport), HistoryError> {
        let started = Instant::now();

        let latest = self.reader.get_block_number().await.map_err(|e| {
            tracing::error!(%address, error = %e, "Failed to fetch latest block");
            HistoryError::InitialHeight(e.to_string())
        })?;
        let start = latest.saturating_sub(self.config.lookback_blocks);
        let partitions = partition_range(start, latest, self.config.partition_size);

        let mut report = ScanReport {
            latest_block: latest,
            start_block: start,
            partitions: partitions.len(),
            ..Default::default()
        };

        let mut logs = Vec::new();
        for range in partitions {
            match self.reader.get_logs(&self.deposit_query(address, range)).await {
                Ok(batch) => {
                    tracing::debug!(%range, matched = batch.len(), "Partition fetched");
                    logs.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(%range, error = %e, "Failed to fetch logs for partition, skipping");
                    report.failed_partitions.push(range);
                }
            }
        }
        report.logs_matched = logs.len();

        let unique = unique_by_tx_hash(logs);
        report.duplicates = report.logs_matched - unique.len();

        let resolved = join_all(unique.iter().map(|log| self.resolve(log))).await;
        let mut records = Vec::with_capacity(resolved.len());
        for outcome in resolved {
            match outcome {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve deposit log, dropping record");
                    report.dropped_records += 1;
                }
            }
        }

        let records = reconcile(records, self.config.max_records);
        report.records = records.len();
        report.elapsed_ms = started.elapsed().as_millis();

        tracing::info!(%address, "{}", report);
        Ok((records, report))
    }

    fn deposit_query(&self, sender: Address, range: BlockRange) -> LogQuery {
        LogQuery {
            address: self.config.contract,
            event_signature: EthDeposited::SIGNATURE_HASH,
            indexed: Some(sender.into_word()),
            range,
        }
    }

    async fn resolve(&self, log: &Log) -> Result<TransferRecord, ChainError> {
        let decoded = log
            .log_decode::<EthDeposited>()
            .map_err(|e| ChainError::RpcError(format!("undecodable EthDeposited log: {}", e)))?;
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| ChainError::RpcError("log without transaction hash".to_string()))?;
        let block_hash = log
            .block_hash
            .ok_or_else(|| ChainError::RpcError("log without block hash".to_string()))?;

        let (_tx, block) = try_join(
            self.reader.get_transaction(tx_hash),
            self.reader.get_block(block_hash),
        )
        .await?;

        Ok(TransferRecord {
            tx_hash,
            block_hash,
            sender: decoded.inner.from,
            recipient: decoded.inner.to,
            amount: decoded.inner.amount.to_string(),
            block_number: log.block_number.unwrap_or(block.number),
            log_index: log.log_index.unwrap_or_default(),
            timestamp_ms: block.timestamp.saturating_mul(1000),
            status: TransferStatus::Confirmed,
        })
    }
}

fn unique_by_tx_hash(logs: Vec<Log>) -> Vec<Log> {
    let mut seen: HashSet<B256> = HashSet::with_capacity(logs.len());
    logs.into_iter()
        .filter(|log| match log.transaction_hash {
            Some(hash) => seen.insert(hash),
            None => true,
        })
        .collect()
}
