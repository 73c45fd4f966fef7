//! Transaction size check and the address-lookup-table fallback
//!
//! A redeem whose legacy transaction exceeds the packet size (or the static
//! account ceiling) is sent in phases:
//!
//! ```text
//! NoTable --create--> TableCreated --extend*--> TableExtended --next slot--> ReadyToSend
//! ```
//!
//! Each submitted phase must be confirmed as finalized before the next
//! instructions are handed out. The whole flow is serde-serialisable so a
//! caller can persist it between process runs.

use serde::{Deserialize, Serialize};
use solana_sdk::address_lookup_table::instruction::{create_lookup_table, extend_lookup_table};
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, Message, VersionedMessage};
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::error::{RelayError, Result};

/// Addresses per extend instruction; keeps each extend transaction small
pub const MAX_ADDRESSES_PER_EXTEND: usize = 20;

/// Default ceiling on static account keys of a single transaction
pub const DEFAULT_MAX_STATIC_ACCOUNTS: usize = 64;

/// Transaction limits applied by the size check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_transaction_bytes: usize,
    pub max_static_accounts: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_transaction_bytes: PACKET_DATA_SIZE,
            max_static_accounts: DEFAULT_MAX_STATIC_ACCOUNTS,
        }
    }
}

/// Serialized size of a signed transaction carrying `message_len` bytes
fn signed_size(num_signatures: usize, message_len: usize) -> usize {
    // compact-u16 signature count is one byte below 128 signers
    1 + 64 * num_signatures + message_len
}

/// Fail with `InstructionSizeExceeded` when the instructions cannot be sent
/// as one legacy transaction.
pub fn check_transaction_size(
    payer: &Pubkey,
    instructions: &[Instruction],
    limits: &SizeLimits,
) -> Result<()> {
    let message = Message::new(instructions, Some(payer));
    let size = signed_size(
        message.header.num_required_signatures as usize,
        message.serialize().len(),
    );
    let accounts = message.account_keys.len();

    debug!(size = size, accounts = accounts, "Legacy transaction size");

    if size > limits.max_transaction_bytes || accounts > limits.max_static_accounts {
        return Err(RelayError::InstructionSizeExceeded {
            size,
            limit: limits.max_transaction_bytes,
            accounts,
            account_limit: limits.max_static_accounts,
        });
    }
    Ok(())
}

// ============================================================================
// State machine
// ============================================================================

/// Persisted phase marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LookupTablePhase {
    NoTable,
    TableCreated { table: Pubkey },
    TableExtended { table: Pubkey, extended_slot: u64 },
    ReadyToSend { table: Pubkey },
}

/// A submitted step waiting for finalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PendingStep {
    Create { table: Pubkey },
    Extend { table: Pubkey, count: usize },
}

/// Finality report for the transaction carrying a pending step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub slot: u64,
    pub finalized: bool,
}

/// What the caller should do next
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    /// Sign and submit these instructions, then call `confirm`
    Submit(Vec<Instruction>),
    /// The table is live; call `compile` for the redeem transaction
    Ready,
}

/// Lookup-table plan for one oversized redeem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTableFlow {
    /// Fee payer; also the table authority
    pub payer: Pubkey,
    /// The redeem instructions to send once the table is ready
    pub instructions: Vec<Instruction>,
    /// Addresses stored in the table
    pub addresses: Vec<Pubkey>,
    pub phase: LookupTablePhase,
    /// Number of `addresses` already written to the table
    pub extended: usize,
    pub pending: Option<PendingStep>,
}

impl LookupTableFlow {
    /// Plan a table holding every non-signer account of `instructions`
    pub fn new(payer: Pubkey, instructions: Vec<Instruction>) -> Self {
        let mut addresses: Vec<Pubkey> = Vec::new();
        for ix in &instructions {
            let keys = ix
                .accounts
                .iter()
                .filter(|meta| !meta.is_signer)
                .map(|meta| meta.pubkey)
                .chain(std::iter::once(ix.program_id));
            for key in keys {
                if key != payer && !addresses.contains(&key) {
                    addresses.push(key);
                }
            }
        }

        Self {
            payer,
            instructions,
            addresses,
            phase: LookupTablePhase::NoTable,
            extended: 0,
            pending: None,
        }
    }

    pub fn table(&self) -> Option<Pubkey> {
        match &self.phase {
            LookupTablePhase::NoTable => None,
            LookupTablePhase::TableCreated { table }
            | LookupTablePhase::TableExtended { table, .. }
            | LookupTablePhase::ReadyToSend { table } => Some(*table),
        }
    }

    /// Hand out the next phase's instructions.
    ///
    /// `recent_slot` must be a recent finalized slot; it seeds the table
    /// address and gates the warm-up after the last extension.
    pub fn next_action(&mut self, recent_slot: u64) -> Result<FlowAction> {
        if let Some(pending) = &self.pending {
            return Err(RelayError::LookupTable(format!(
                "previous step {:?} is not finalized yet",
                pending
            )));
        }

        match self.phase.clone() {
            LookupTablePhase::NoTable => {
                let (ix, table) = create_lookup_table(self.payer, self.payer, recent_slot);
                info!(table = %table, recent_slot = recent_slot, "Creating address lookup table");
                self.pending = Some(PendingStep::Create { table });
                Ok(FlowAction::Submit(vec![ix]))
            }
            LookupTablePhase::TableCreated { table } => {
                let end = (self.extended + MAX_ADDRESSES_PER_EXTEND).min(self.addresses.len());
                let chunk = self.addresses[self.extended..end].to_vec();
                let count = chunk.len();
                let ix = extend_lookup_table(table, self.payer, Some(self.payer), chunk);
                info!(
                    table = %table,
                    from = self.extended,
                    count = count,
                    total = self.addresses.len(),
                    "Extending address lookup table"
                );
                self.pending = Some(PendingStep::Extend { table, count });
                Ok(FlowAction::Submit(vec![ix]))
            }
            LookupTablePhase::TableExtended {
                table,
                extended_slot,
            } => {
                // Addresses become usable in the slot after the extension
                if recent_slot <= extended_slot {
                    return Err(RelayError::LookupTable(format!(
                        "table {} extended at slot {}, not usable at slot {}",
                        table, extended_slot, recent_slot
                    )));
                }
                self.phase = LookupTablePhase::ReadyToSend { table };
                Ok(FlowAction::Ready)
            }
            LookupTablePhase::ReadyToSend { .. } => Ok(FlowAction::Ready),
        }
    }

    /// Record finalization of the pending step and advance the phase
    pub fn confirm(&mut self, confirmation: Confirmation) -> Result<()> {
        let pending = self
            .pending
            .clone()
            .ok_or_else(|| RelayError::LookupTable("no step awaiting confirmation".to_string()))?;

        if !confirmation.finalized {
            return Err(RelayError::LookupTable(format!(
                "step {:?} landed at slot {} but is not finalized",
                pending, confirmation.slot
            )));
        }

        self.pending = None;
        match pending {
            PendingStep::Create { table } => {
                self.phase = LookupTablePhase::TableCreated { table };
            }
            PendingStep::Extend { table, count } => {
                self.extended += count;
                if self.extended >= self.addresses.len() {
                    self.phase = LookupTablePhase::TableExtended {
                        table,
                        extended_slot: confirmation.slot,
                    };
                }
            }
        }

        debug!(phase = ?self.phase, "Lookup table step finalized");
        Ok(())
    }

    /// Compile the redeem instructions into a v0 message against the table
    pub fn compile(&self, recent_blockhash: Hash) -> Result<VersionedMessage> {
        let LookupTablePhase::ReadyToSend { table } = &self.phase else {
            return Err(RelayError::LookupTable(format!(
                "cannot compile in phase {:?}",
                self.phase
            )));
        };

        let lookup = AddressLookupTableAccount {
            key: *table,
            addresses: self.addresses.clone(),
        };
        let message = v0::Message::try_compile(&self.payer, &self.instructions, &[lookup], recent_blockhash)
            .map_err(|e| RelayError::LookupTable(format!("v0 compile failed: {}", e)))?;

        let size = signed_size(
            message.header.num_required_signatures as usize,
            VersionedMessage::V0(message.clone()).serialize().len(),
        );
        if size > PACKET_DATA_SIZE {
            return Err(RelayError::InstructionSizeExceeded {
                size,
                limit: PACKET_DATA_SIZE,
                accounts: message.account_keys.len(),
                account_limit: message.account_keys.len(),
            });
        }

        Ok(VersionedMessage::V0(message))
    }
}
