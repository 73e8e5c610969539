//! Error types for the synchronization engine

use common::amount::AmountError;

/// Errors raised by a chain endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    RpcError(String),
    NotFound(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::RpcError(msg) => write!(f, "RPC error: {}", msg),
            ChainError::NotFound(what) => write!(f, "Not found: {}", what),
        }
    }
}

impl std::error::Error for ChainError {}

/// Reasons a deposit never reaches, or never leaves, the chain.
///
/// The first four are local precondition failures raised before any chain
/// contact. `BroadcastFailure` and `ConfirmationFailure` end up inside
/// `SubmissionState::Failed` and carry the endpoint's message untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    NotConnected,
    InvalidAmount(AmountError),
    InvalidRecipient(String),
    WrongNetwork { expected: u64, actual: Option<u64> },
    BroadcastFailure(String),
    ConfirmationFailure(String),
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::NotConnected => write!(f, "Wallet is not connected"),
            SubmissionError::InvalidAmount(e) => write!(f, "{}", e),
            SubmissionError::InvalidRecipient(input) => {
                write!(f, "Invalid recipient address: {}", input)
            }
            SubmissionError::WrongNetwork { expected, actual } => match actual {
                Some(actual) => write!(
                    f,
                    "Wrong network: connected to chain {}, switch to chain {}",
                    actual, expected
                ),
                None => write!(f, "Wrong network: switch to chain {}", expected),
            },
            SubmissionError::BroadcastFailure(msg) => write!(f, "{}", msg),
            SubmissionError::ConfirmationFailure(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SubmissionError {}

impl From<AmountError> for SubmissionError {
    fn from(err: AmountError) -> Self {
        SubmissionError::InvalidAmount(err)
    }
}

/// Fatal history scan failures. Partition and per-record failures are
/// absorbed by the scanner and never show up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    InitialHeight(String),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::InitialHeight(msg) => {
                write!(f, "Failed to load transaction history: {}", msg)
            }
        }
    }
}

impl std::error::Error for HistoryError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    NotConnected,
    History(HistoryError),
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewError::NotConnected => write!(f, "Wallet is not connected"),
            ViewError::History(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ViewError {}

impl From<HistoryError> for ViewError {
    fn from(err: HistoryError) -> Self {
        ViewError::History(err)
    }
}
