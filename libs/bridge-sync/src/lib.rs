//! Deposit tracking and history reconciliation for the Sepolia to RISE
//! native bridge.

pub mod client;
pub mod errors;
pub mod history;
pub mod refresh;
pub mod session;
pub mod submission;
pub mod types;
pub mod views;

#[cfg(test)]
mod testing;

pub use client::{AlloyChainClient, ChainReader, LogQuery, TransactionSender};
pub use errors::{ChainError, HistoryError, SubmissionError, ViewError};
pub use history::{HistoryConfig, HistoryScanner, ScanReport};
pub use refresh::{RefreshCoordinator, RefreshSlot};
pub use session::{SessionProvider, StaticSession};
pub use submission::{DepositRequest, SubmissionConfig, SubmissionState, SubmissionTracker};
pub use types::{BalanceSnapshot, BlockRange, TransferRecord, TransferStatus};
pub use views::{activate, ActiveView, RefreshableView};
