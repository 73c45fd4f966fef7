//! Relay-Core: Burn-and-Mint Cross-Chain Relay Engine
//!
//! This crate turns a burn transaction into the unsigned calls that mint the
//! tokens on the destination chain:
//!
//! - **Chain Registry** - Static per-chain descriptors (domain, RPC, contracts)
//! - **Message Codec** - MessageSent extraction and header/burn-body decoding
//! - **Attestation** - Iris client plus bounded backoff polling
//! - **Derivation** - Destination accounts (static EVM contracts, Solana PDAs)
//! - **Assembler** - Burn and redeem call sequences, lookup-table fallback
//! - **Relay** - The `send` / `redeem` orchestrator
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! relay-core = { path = "../relay-core" }
//! ```
//!
//! The engine never signs or broadcasts. Every operation returns unsigned
//! calls or instructions for the caller's wallet.

// Core modules
pub mod address_codec;
pub mod assembler;
pub mod attestation;
pub mod chain;
pub mod derivation;
pub mod error;
pub mod hash;
pub mod message;
pub mod registry;
pub mod relay;

// Chain-specific modules
pub mod evm;
pub mod solana;

// Re-export commonly used items at the crate root
pub use assembler::{
    build_burn_transaction, build_redeem_transaction, encode_mint_recipient, parse_amount,
    RedeemOptions, RedemptionTransaction, SolanaRedemption, SubmitPlan,
};
pub use attestation::{
    Attestation, AttestationEnvironment, AttestationPoller, AttestationProvider,
    AttestationQuery, AttestationStatus, IrisClient, PollConfig,
};
pub use chain::{ChainReaders, DestinationChainReader, RpcChainReaders, SourceChainReader};
pub use derivation::{derive_accounts, DerivationInput, DerivedAccountSet, RedemptionModel};
pub use error::{RelayError, Result};
pub use evm::EvmCall;
pub use message::{extract_message, BurnMessage, BurnReceipt, MessageEnvelope, ReceiptLog};
pub use registry::{ChainContracts, ChainDescriptor, ChainRegistry};
pub use relay::{RedeemRequest, Relay, RelayOptions};
