pub mod amount;
pub mod chain;

pub mod interfaces {
    pub mod l1_bridge;
}

pub use chain::{Chain, ETHEREUM_SEPOLIA_ID, RISE_SEPOLIA_ID};
