//! Attestation Module
//!
//! - `client` - single-shot queries against the Iris attestation service
//! - `poll` - bounded exponential-backoff polling with deadline and cancellation

pub mod client;
pub mod poll;

pub use client::{
    Attestation, AttestationEnvironment, AttestationProvider, AttestationQuery,
    AttestationStatus, IrisClient, IRIS_MAINNET_URL, IRIS_SANDBOX_URL,
};
pub use poll::{AttestationPoller, PollConfig};
