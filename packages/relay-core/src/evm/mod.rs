//! EVM Module
//!
//! - `contracts` - sol! bindings for ERC20, TokenMessenger, MessageTransmitter
//! - `calls` - unsigned approve / depositForBurn / receiveMessage calls
//! - `client` - JSON-RPC reader for receipts, allowances and used nonces

pub mod calls;
pub mod client;
pub mod contracts;

pub use calls::{approve_call, deposit_for_burn_call, receive_message_call, EvmCall};
pub use client::EvmReader;
