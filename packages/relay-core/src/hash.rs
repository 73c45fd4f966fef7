//! Hash helpers shared by the codec and the EVM reader
//!
//! - `keccak256` is the message-hash function used as the attestation lookup
//!   key and the MessageSent topic hash.
//! - `used_nonce_key` matches MessageTransmitter's `_hashSourceAndNonce`:
//! ```solidity
//! keccak256(abi.encodePacked(sourceDomain, nonce))
//! ```

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Key of the EVM MessageTransmitter `usedNonces` mapping for (source domain, nonce)
pub fn used_nonce_key(source_domain: u32, nonce: u64) -> [u8; 32] {
    // abi.encodePacked layout: 4 + 8 = 12 bytes
    let mut data = [0u8; 12];
    data[0..4].copy_from_slice(&source_domain.to_be_bytes());
    data[4..12].copy_from_slice(&nonce.to_be_bytes());
    keccak256(&data)
}

/// Convert an EVM address to bytes32 (left-padded with zeros)
pub fn address_to_bytes32(addr: &[u8; 20]) -> [u8; 32] {
    let mut result = [0u8; 32];
    result[12..32].copy_from_slice(addr);
    result
}

/// Extract raw 20-byte address from bytes32
pub fn bytes32_to_address(bytes: &[u8; 32]) -> [u8; 20] {
    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes[12..32]);
    result
}

/// Convert bytes to hex string with 0x prefix
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
