//! Identity records for the two chains the bridge connects.

use serde::{Deserialize, Serialize};

pub const ETHEREUM_SEPOLIA_ID: u64 = 11_155_111;
pub const RISE_SEPOLIA_ID: u64 = 11_155_931;

/// Immutable description of one chain endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: u64,
    pub display_name: String,
    pub native_symbol: String,
    pub rpc_url: String,
    pub explorer_url: String,
}

impl Chain {
    /// Source chain. The public RPC is rate limited, so callers normally
    /// supply their own provider URL.
    pub fn ethereum_sepolia(rpc_url: impl Into<String>) -> Self {
        Self {
            chain_id: ETHEREUM_SEPOLIA_ID,
            display_name: "Ethereum Sepolia".to_string(),
            native_symbol: "ETH".to_string(),
            rpc_url: rpc_url.into(),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        }
    }

    /// Destination chain.
    pub fn rise_sepolia() -> Self {
        Self {
            chain_id: RISE_SEPOLIA_ID,
            display_name: "RISE Sepolia".to_string(),
            native_symbol: "ETH".to_string(),
            rpc_url: "https://testnet.riselabs.xyz".to_string(),
            explorer_url: "https://explorer.riselabs.xyz".to_string(),
        }
    }

    /// Explorer link for a transaction hash (`0x`-prefixed).
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.chain_id)
    }
}
