//! Solana Module
//!
//! - `pda` - program-derived addresses and the used-nonces bitmap
//! - `instructions` - receive_message, ATA creation, SPL transfer, view calls
//! - `lookup_table` - size check and the address-lookup-table state machine
//! - `client` - nonblocking RPC reader

pub mod client;
pub mod instructions;
pub mod lookup_table;
pub mod pda;

pub use client::SolanaReader;
pub use lookup_table::{
    check_transaction_size, Confirmation, FlowAction, LookupTableFlow, LookupTablePhase, SizeLimits,
};
pub use pda::{associated_token_address, Pda, ReceiveMessagePdas};
