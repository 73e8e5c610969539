//! Chain query and transaction seams.
//!
//! The engine only talks to chains through [`ChainReader`] and
//! [`TransactionSender`]. [`AlloyChainClient`] backs both with a JSON-RPC
//! endpoint; tests substitute a scripted in-memory chain.

use crate::errors::ChainError;
use crate::types::{BlockInfo, BlockRange, TransactionInfo, TxReceipt};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy_primitives::{Address, B256, U256};
use std::time::Duration;

/// One bounded `eth_getLogs` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub event_signature: B256,
    /// First indexed argument (topic1), if filtered
    pub indexed: Option<B256>,
    pub range: BlockRange,
}

impl LogQuery {
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new()
            .address(self.address)
            .event_signature(self.event_signature)
            .from_block(self.range.from)
            .to_block(self.range.to);
        if let Some(topic) = self.indexed {
            filter = filter.topic1(topic);
        }
        filter
    }
}

/// Read-only queries against one chain
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn get_block_number(&self) -> Result<u64, ChainError>;

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>, ChainError>;

    async fn get_transaction(&self, hash: B256) -> Result<TransactionInfo, ChainError>;

    async fn get_block(&self, hash: B256) -> Result<BlockInfo, ChainError>;

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;
}

/// Signs (via the wallet behind the endpoint) and broadcasts transactions
#[async_trait::async_trait]
pub trait TransactionSender: Send + Sync {
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, ChainError>;

    /// Wait until the endpoint reports a receipt. No timeout.
    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ChainError>;
}

/// JSON-RPC chain client - generic over provider type
pub struct AlloyChainClient<P>
where
    P: Provider + Clone,
{
    provider: P,
    chain_id: u64,
    receipt_poll_interval: Duration,
}

impl<P> AlloyChainClient<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(provider: P, chain_id: u64) -> Self {
        Self {
            provider,
            chain_id,
            receipt_poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    /// Chain id as reported by the endpoint itself
    pub async fn remote_chain_id(&self) -> Result<u64, ChainError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl<P> ChainReader for AlloyChainClient<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>, ChainError> {
        self.provider
            .get_logs(&query.to_filter())
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))
    }

    async fn get_transaction(&self, hash: B256) -> Result<TransactionInfo, ChainError> {
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?
            .ok_or_else(|| ChainError::NotFound(format!("transaction {:?}", hash)))?;

        Ok(TransactionInfo {
            hash,
            from: alloy::network::TransactionResponse::from(&tx),
            value: alloy::consensus::Transaction::value(&tx),
        })
    }

    async fn get_block(&self, hash: B256) -> Result<BlockInfo, ChainError> {
        let block = self
            .provider
            .get_block_by_hash(hash)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?
            .ok_or_else(|| ChainError::NotFound(format!("block {:?}", hash)))?;

        Ok(BlockInfo {
            hash,
            number: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl<P> TransactionSender for AlloyChainClient<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, ChainError> {
        let pending_tx = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;
        let tx_hash = *pending_tx.tx_hash();

        tracing::debug!(chain_id = self.chain_id, ?tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceipt, ChainError> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| ChainError::RpcError(e.to_string()))?;

            if let Some(receipt) = receipt {
                return Ok(TxReceipt {
                    tx_hash: hash,
                    block_number: receipt.block_number.unwrap_or(0),
                    gas_used: receipt.gas_used,
                    status: receipt.status(),
                });
            }

            tracing::trace!(?hash, "Receipt not available yet");
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::ProviderBuilder;

    #[test]
    fn test_log_query_filter_bounds() {
        let query = LogQuery {
            address: Address::repeat_byte(0x11),
            event_signature: B256::repeat_byte(0x22),
            indexed: Some(Address::repeat_byte(0xaa).into_word()),
            range: BlockRange::new(8000, 8449),
        };

        let filter = query.to_filter();
        assert_eq!(filter.get_from_block(), Some(8000));
        assert_eq!(filter.get_to_block(), Some(8449));
    }

    #[test]
    fn test_client_reports_configured_chain_id() {
        let provider = ProviderBuilder::new().connect_http("http://localhost:8545".parse().unwrap());
        let client = AlloyChainClient::new(provider, 11_155_111)
            .with_receipt_poll_interval(Duration::from_millis(250));

        assert_eq!(ChainReader::chain_id(&client), 11_155_111);
        assert_eq!(client.receipt_poll_interval, Duration::from_millis(250));
    }
}
