//! JSON rendering of unsigned calls and instructions
//!
//! Addresses are printed as hex (EVM) or base58 (Solana) strings and
//! instruction data as base64, so the output can be fed to any signer.

use base64::{engine::general_purpose::STANDARD, Engine};
use relay_core::{EvmCall, RedemptionTransaction, SubmitPlan};
use serde::Serialize;
use serde_json::{json, Value};
use solana_sdk::instruction::Instruction;

#[derive(Debug, Serialize)]
pub struct AccountJson {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Serialize)]
pub struct InstructionJson {
    pub program_id: String,
    pub accounts: Vec<AccountJson>,
    /// base64
    pub data: String,
}

pub fn render_instructions(instructions: &[Instruction]) -> Vec<InstructionJson> {
    instructions
        .iter()
        .map(|ix| InstructionJson {
            program_id: ix.program_id.to_string(),
            accounts: ix
                .accounts
                .iter()
                .map(|meta| AccountJson {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: STANDARD.encode(&ix.data),
        })
        .collect()
}

pub fn render_calls(calls: &[EvmCall]) -> Value {
    json!({
        "chain": "evm",
        "calls": calls,
    })
}

/// Render a redeem; `state_file` is where a lookup-table plan was stored
pub fn render_redemption(tx: &RedemptionTransaction, state_file: Option<&str>) -> Value {
    match tx {
        RedemptionTransaction::Evm(calls) => render_calls(calls),
        RedemptionTransaction::Solana(redemption) => {
            let mode = match &redemption.plan {
                SubmitPlan::Single => "single",
                SubmitPlan::LookupTable(_) => "lookup_table",
            };
            json!({
                "chain": "solana",
                "payer": redemption.payer.to_string(),
                "mode": mode,
                "state_file": state_file,
                "instructions": render_instructions(&redemption.instructions),
            })
        }
    }
}
