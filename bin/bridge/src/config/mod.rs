use common::interfaces::l1_bridge::{BRIDGE_CONTRACT_ADDRESS, DEFAULT_MIN_GAS_LIMIT};
use common::Chain;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub source: Chain,
    pub destination: Chain,
    pub bridge_contract: String,
    pub min_gas_limit: u32,
    pub history: HistorySettings,
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    pub lookback_blocks: u64,
    pub partition_size: u64,
    pub max_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    pub poll_interval_secs: u64,
    pub balances_delay_ms: u64,
    pub history_delay_ms: u64,
    pub receipt_poll_interval_ms: u64,
}

impl BridgeConfig {
    pub async fn load_from_file(path: &Path) -> eyre::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Apply SEPOLIA_RPC_URL, RISE_RPC_URL and BRIDGE_CONTRACT_ADDRESS
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SEPOLIA_RPC_URL") {
            self.source.rpc_url = url;
        }
        if let Ok(url) = std::env::var("RISE_RPC_URL") {
            self.destination.rpc_url = url;
        }
        if let Ok(address) = std::env::var("BRIDGE_CONTRACT_ADDRESS") {
            self.bridge_contract = address;
        }
        self
    }
}

impl RefreshSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn balances_delay(&self) -> Duration {
        Duration::from_millis(self.balances_delay_ms)
    }

    pub fn history_delay(&self) -> Duration {
        Duration::from_millis(self.history_delay_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            source: Chain::ethereum_sepolia("http://localhost:8545"),
            destination: Chain::rise_sepolia(),
            bridge_contract: BRIDGE_CONTRACT_ADDRESS.to_string(),
            min_gas_limit: DEFAULT_MIN_GAS_LIMIT,
            history: HistorySettings {
                lookback_blocks: 2000,
                partition_size: 450,
                max_records: 20,
            },
            refresh: RefreshSettings {
                poll_interval_secs: 10,
                balances_delay_ms: 2000,
                history_delay_ms: 3000,
                receipt_poll_interval_ms: 1000,
            },
        }
    }
}
