//! Message Codec
//!
//! Extracts the CCTP message from a burn receipt and decodes it.
//!
//! ## MessageSent log
//!
//! ```text
//! topic0 = keccak256("MessageSent(bytes)")
//! data   = | offset (32) | length (32) | message (length, padded to 32) |
//! ```
//!
//! ## Message header (big-endian)
//!
//! ```text
//! | version u32 | sourceDomain u32 | destinationDomain u32 | nonce u64 |
//! |     0..4    |       4..8       |         8..12         |   12..20  |
//! | sender bytes32 | recipient bytes32 | destinationCaller bytes32 | body |
//! |     20..52     |      52..84       |          84..116          | 116..|
//! ```
//!
//! ## BurnMessage body
//!
//! ```text
//! | version u32 | burnToken bytes32 | mintRecipient bytes32 | amount uint256 | messageSender bytes32 |
//! |     0..4    |       4..36       |        36..68         |     68..100    |       100..132        |
//! ```

use alloy::primitives::{Address, Bytes, B256, U256};

use crate::error::{RelayError, Result};
use crate::hash::keccak256;

/// Header length; the body starts here
pub const MESSAGE_HEADER_LEN: usize = 116;

/// Length of a version-0 BurnMessage body
pub const BURN_MESSAGE_LEN: usize = 132;

/// Nonce field offset within the header
pub const NONCE_OFFSET: usize = 12;

/// topic0 of `MessageSent(bytes)`
pub fn message_sent_topic() -> B256 {
    B256::from(keccak256(b"MessageSent(bytes)"))
}

// ============================================================================
// Receipt view
// ============================================================================

/// One log entry of a source-chain receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The parts of a source-chain receipt the codec needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnReceipt {
    pub tx_hash: B256,
    /// false when the transaction reverted
    pub success: bool,
    pub logs: Vec<ReceiptLog>,
}

// ============================================================================
// Envelope
// ============================================================================

/// Decoded CCTP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub raw: Vec<u8>,
    pub version: u32,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub nonce: u64,
    pub sender: [u8; 32],
    pub recipient: [u8; 32],
    pub destination_caller: [u8; 32],
    pub body: Vec<u8>,
}

impl MessageEnvelope {
    /// Decode a raw message
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < MESSAGE_HEADER_LEN {
            return Err(RelayError::MalformedMessage(format!(
                "message is {} bytes, header needs {}",
                raw.len(),
                MESSAGE_HEADER_LEN
            )));
        }

        Ok(Self {
            raw: raw.to_vec(),
            version: read_u32(raw, 0),
            source_domain: read_u32(raw, 4),
            destination_domain: read_u32(raw, 8),
            nonce: decode_nonce(raw)?,
            sender: read_bytes32(raw, 20),
            recipient: read_bytes32(raw, 52),
            destination_caller: read_bytes32(raw, 84),
            body: raw[MESSAGE_HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize header fields and body into the wire layout
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        version: u32,
        source_domain: u32,
        destination_domain: u32,
        nonce: u64,
        sender: [u8; 32],
        recipient: [u8; 32],
        destination_caller: [u8; 32],
        body: &[u8],
    ) -> Vec<u8> {
        let mut raw = Vec::with_capacity(MESSAGE_HEADER_LEN + body.len());
        raw.extend_from_slice(&version.to_be_bytes());
        raw.extend_from_slice(&source_domain.to_be_bytes());
        raw.extend_from_slice(&destination_domain.to_be_bytes());
        raw.extend_from_slice(&nonce.to_be_bytes());
        raw.extend_from_slice(&sender);
        raw.extend_from_slice(&recipient);
        raw.extend_from_slice(&destination_caller);
        raw.extend_from_slice(body);
        raw
    }

    /// keccak256 of the raw message; the attestation lookup key
    pub fn message_hash(&self) -> [u8; 32] {
        keccak256(&self.raw)
    }

    /// Decode the body as a token-messenger BurnMessage
    pub fn burn_message(&self) -> Result<BurnMessage> {
        BurnMessage::decode(&self.body)
    }
}

/// Decode the nonce at offset 12 without decoding the rest of the header
pub fn decode_nonce(raw: &[u8]) -> Result<u64> {
    let bytes = raw.get(NONCE_OFFSET..NONCE_OFFSET + 8).ok_or_else(|| {
        RelayError::MalformedMessage(format!("message too short for nonce: {} bytes", raw.len()))
    })?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

// ============================================================================
// Burn message
// ============================================================================

/// Body of a token-messenger message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnMessage {
    pub version: u32,
    pub burn_token: [u8; 32],
    pub mint_recipient: [u8; 32],
    pub amount: U256,
    pub message_sender: [u8; 32],
}

impl BurnMessage {
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < BURN_MESSAGE_LEN {
            return Err(RelayError::MalformedMessage(format!(
                "burn message is {} bytes, expected {}",
                body.len(),
                BURN_MESSAGE_LEN
            )));
        }

        Ok(Self {
            version: read_u32(body, 0),
            burn_token: read_bytes32(body, 4),
            mint_recipient: read_bytes32(body, 36),
            amount: U256::from_be_bytes(read_bytes32(body, 68)),
            message_sender: read_bytes32(body, 100),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BURN_MESSAGE_LEN);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.burn_token);
        out.extend_from_slice(&self.mint_recipient);
        out.extend_from_slice(&self.amount.to_be_bytes::<32>());
        out.extend_from_slice(&self.message_sender);
        out
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract the CCTP message from a burn receipt.
///
/// When `transmitter` is given, only logs emitted by that contract are
/// considered; any contract can emit an event with the same signature.
pub fn extract_message(
    receipt: &BurnReceipt,
    transmitter: Option<Address>,
) -> Result<MessageEnvelope> {
    let topic = message_sent_topic();

    let log = receipt
        .logs
        .iter()
        .filter(|log| transmitter.map_or(true, |t| log.address == t))
        .find(|log| log.topics.first() == Some(&topic))
        .ok_or_else(|| RelayError::MessageNotFound {
            tx_hash: receipt.tx_hash.to_string(),
        })?;

    let raw = decode_abi_bytes(&log.data)?;
    let envelope = MessageEnvelope::decode(&raw)?;

    tracing::debug!(
        tx_hash = %receipt.tx_hash,
        source_domain = envelope.source_domain,
        destination_domain = envelope.destination_domain,
        nonce = envelope.nonce,
        message_hash = %B256::from(envelope.message_hash()),
        "Extracted MessageSent"
    );

    Ok(envelope)
}

/// ABI-encode a single `bytes` value (event data layout)
pub fn encode_abi_bytes(payload: &[u8]) -> Vec<u8> {
    let padded_len = payload.len().div_ceil(32) * 32;
    let mut data = vec![0u8; 64 + padded_len];
    data[31] = 0x20;
    data[32..64].copy_from_slice(&U256::from(payload.len()).to_be_bytes::<32>());
    data[64..64 + payload.len()].copy_from_slice(payload);
    data
}

/// Decode the single `bytes` value of a MessageSent log
fn decode_abi_bytes(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 64 {
        return Err(RelayError::MalformedMessage(format!(
            "event data is {} bytes, need at least 64",
            data.len()
        )));
    }

    let offset = read_word_as_usize(data, 0)?;
    let len_end = offset
        .checked_add(32)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| RelayError::MalformedMessage(format!("bytes offset {} out of range", offset)))?;
    let length = read_word_as_usize(data, offset)?;

    let payload = data
        .get(len_end..)
        .and_then(|rest| rest.get(..length))
        .ok_or_else(|| {
            RelayError::MalformedMessage(format!(
                "bytes length {} exceeds event data ({} bytes)",
                length,
                data.len()
            ))
        })?;

    Ok(payload.to_vec())
}

fn read_word_as_usize(data: &[u8], at: usize) -> Result<usize> {
    let word = U256::from_be_bytes(read_bytes32(data, at));
    usize::try_from(word)
        .map_err(|_| RelayError::MalformedMessage(format!("ABI word at {} too large", at)))
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[at..at + 4]);
    u32::from_be_bytes(buf)
}

fn read_bytes32(data: &[u8], at: usize) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&data[at..at + 32]);
    buf
}
