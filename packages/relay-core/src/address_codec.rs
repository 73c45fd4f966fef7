//! Address parsing for the two chain families
//!
//! CCTP carries every address as 32 bytes:
//! ```text
//! EVM:    | zero padding (12 bytes) | raw address (20 bytes) |
//! Solana: | ed25519 public key (32 bytes)                    |
//! ```

use alloy::primitives::{Address, B256};
use solana_sdk::pubkey::Pubkey;

use crate::error::{RelayError, Result};
use crate::hash::address_to_bytes32;

/// Parse a 0x-prefixed (or bare) 20-byte EVM address
pub fn parse_evm_address(addr: &str) -> Result<Address> {
    let hex_str = addr.strip_prefix("0x").unwrap_or(addr);

    if hex_str.len() != 40 {
        return Err(RelayError::InvalidAddress(format!(
            "EVM address must be 40 hex chars, got {} ({})",
            hex_str.len(),
            addr
        )));
    }

    let bytes = hex::decode(hex_str)
        .map_err(|e| RelayError::InvalidAddress(format!("{}: {}", addr, e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Parse a 0x-prefixed 32-byte value (tx hash, bytes32 recipient)
pub fn parse_bytes32(value: &str) -> Result<[u8; 32]> {
    let hex_str = value.strip_prefix("0x").unwrap_or(value);

    if hex_str.len() != 64 {
        return Err(RelayError::InvalidAddress(format!(
            "expected 64 hex chars, got {} ({})",
            hex_str.len(),
            value
        )));
    }

    let bytes = hex::decode(hex_str)
        .map_err(|e| RelayError::InvalidAddress(format!("{}: {}", value, e)))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Parse an EVM transaction hash
pub fn parse_tx_hash(value: &str) -> Result<B256> {
    parse_bytes32(value).map(B256::from)
}

/// Parse a base58 Solana public key
pub fn parse_solana_pubkey(value: &str) -> Result<Pubkey> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| RelayError::InvalidAddress(format!("{}: {}", value, e)))?;

    if bytes.len() != 32 {
        return Err(RelayError::InvalidAddress(format!(
            "Solana public key must be 32 bytes, got {} ({})",
            bytes.len(),
            value
        )));
    }

    let mut raw = [0u8; 32];
    raw.copy_from_slice(&bytes);
    Ok(Pubkey::new_from_array(raw))
}

/// Left-pad an EVM address to the 32-byte CCTP form
pub fn evm_address_to_bytes32(addr: &Address) -> [u8; 32] {
    address_to_bytes32(&addr.0 .0)
}

/// Whether the string looks like an EVM address rather than base58
pub fn is_evm_address(value: &str) -> bool {
    value.starts_with("0x") && value.len() == 42
}
