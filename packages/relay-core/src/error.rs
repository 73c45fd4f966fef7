//! Relay error taxonomy
//!
//! Every fallible operation in this crate returns [`RelayError`]. The variants
//! split into two groups:
//!
//! - **Retryable** - attestation still pending, attestation service faults, RPC
//!   transport failures. The orchestrator may poll again.
//! - **Fatal** - malformed input or misconfiguration (codec, derivation,
//!   registry, amount). Retrying with the same input yields the same error.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The burn receipt carries no MessageSent event
    #[error("MessageSent event not found in transaction {tx_hash}")]
    MessageNotFound { tx_hash: String },

    /// The source chain has no receipt for the transaction (yet)
    #[error("receipt not found for transaction {tx_hash}")]
    ReceiptNotFound { tx_hash: String },

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The poll deadline passed while the service still reported pending
    #[error("attestation for {key} still pending after {elapsed_secs}s")]
    AttestationPending { key: String, elapsed_secs: u64 },

    /// The attestation service answered with an error or an unexpected shape
    #[error("attestation service error: {0}")]
    AttestationError(String),

    #[error("attestation for {key} not complete after {elapsed_secs}s (last status: {last_status})")]
    AttestationTimeout {
        key: String,
        elapsed_secs: u64,
        last_status: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// Redeem assembly was called without a complete, signed attestation
    #[error("attestation is not complete")]
    AttestationIncomplete,

    #[error("account derivation failed: {0}")]
    DerivationFailure(String),

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("message routed {source_domain}->{destination_domain}, expected {expected_source}->{expected_destination}")]
    DomainMismatch {
        source_domain: u32,
        destination_domain: u32,
        expected_source: u32,
        expected_destination: u32,
    },

    #[error("unsupported route: {0}")]
    UnsupportedRoute(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Raised by the size check; converted into a lookup-table plan
    #[error("transaction too large: {size} bytes / {accounts} accounts (limit {limit} bytes / {account_limit} accounts)")]
    InstructionSizeExceeded {
        size: usize,
        limit: usize,
        accounts: usize,
        account_limit: usize,
    },

    #[error("lookup table: {0}")]
    LookupTable(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether polling or re-invoking the same call may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::ReceiptNotFound { .. }
                | RelayError::AttestationPending { .. }
                | RelayError::AttestationError(_)
                | RelayError::AttestationTimeout { .. }
                | RelayError::Rpc(_)
        )
    }

    /// Short machine-readable tag, used as the `kind` field of logged errors
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MessageNotFound { .. } => "message_not_found",
            RelayError::ReceiptNotFound { .. } => "receipt_not_found",
            RelayError::MalformedMessage(_) => "malformed_message",
            RelayError::AttestationPending { .. } => "attestation_pending",
            RelayError::AttestationError(_) => "attestation_error",
            RelayError::AttestationTimeout { .. } => "attestation_timeout",
            RelayError::Cancelled => "cancelled",
            RelayError::AttestationIncomplete => "attestation_incomplete",
            RelayError::DerivationFailure(_) => "derivation_failure",
            RelayError::UnknownChain(_) => "unknown_chain",
            RelayError::DomainMismatch { .. } => "domain_mismatch",
            RelayError::UnsupportedRoute(_) => "unsupported_route",
            RelayError::InvalidAmount(_) => "invalid_amount",
            RelayError::InvalidAddress(_) => "invalid_address",
            RelayError::InstructionSizeExceeded { .. } => "instruction_size_exceeded",
            RelayError::LookupTable(_) => "lookup_table",
            RelayError::Rpc(_) => "rpc",
            RelayError::Config(_) => "config",
        }
    }
}
