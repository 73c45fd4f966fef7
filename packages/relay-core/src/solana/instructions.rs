//! Instruction builders for the Solana redeem path
//!
//! Anchor instructions carry `sha256("global:<name>")[..8]` followed by the
//! borsh-encoded params struct.

use borsh::BorshSerialize;
use solana_sdk::hash::hashv;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};

use super::pda::{
    associated_token_address, ReceiveMessagePdas, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::error::{RelayError, Result};

/// SPL Token `Transfer` instruction tag
const SPL_TRANSFER_TAG: u8 = 3;

/// Anchor global instruction discriminator
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let hash = hashv(&[format!("global:{}", name).as_bytes()]);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.to_bytes()[..8]);
    out
}

#[derive(BorshSerialize)]
struct ReceiveMessageParams {
    message: Vec<u8>,
    attestation: Vec<u8>,
}

#[derive(BorshSerialize)]
struct GetNoncePdaParams {
    nonce: u64,
    source_domain: u32,
}

fn anchor_data<T: BorshSerialize>(name: &str, params: &T) -> Result<Vec<u8>> {
    let mut data = anchor_discriminator(name).to_vec();
    let encoded = params
        .try_to_vec()
        .map_err(|e| RelayError::MalformedMessage(format!("borsh encode {}: {}", name, e)))?;
    data.extend_from_slice(&encoded);
    Ok(data)
}

/// MessageTransmitter `receive_message`, with the TokenMessengerMinter
/// accounts appended as remaining accounts.
pub fn receive_message(
    message_transmitter_program: &Pubkey,
    token_messenger_minter_program: &Pubkey,
    payer: &Pubkey,
    pdas: &ReceiveMessagePdas,
    user_token_account: &Pubkey,
    message: &[u8],
    attestation: &[u8],
) -> Result<Instruction> {
    let data = anchor_data(
        "receive_message",
        &ReceiveMessageParams {
            message: message.to_vec(),
            attestation: attestation.to_vec(),
        },
    )?;

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(*payer, true), // caller
        AccountMeta::new_readonly(pdas.authority_pda.address, false),
        AccountMeta::new_readonly(pdas.message_transmitter.address, false),
        AccountMeta::new(pdas.used_nonces.address, false),
        AccountMeta::new_readonly(*token_messenger_minter_program, false), // receiver
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(pdas.message_transmitter_event_authority.address, false),
        AccountMeta::new_readonly(*message_transmitter_program, false),
        // remaining accounts consumed by handle_receive_message
        AccountMeta::new_readonly(pdas.token_messenger.address, false),
        AccountMeta::new_readonly(pdas.remote_token_messenger.address, false),
        AccountMeta::new(pdas.token_minter.address, false),
        AccountMeta::new(pdas.local_token.address, false),
        AccountMeta::new_readonly(pdas.token_pair.address, false),
        AccountMeta::new(*user_token_account, false),
        AccountMeta::new(pdas.custody.address, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(pdas.token_messenger_event_authority.address, false),
        AccountMeta::new_readonly(*token_messenger_minter_program, false),
    ];

    Ok(Instruction {
        program_id: *message_transmitter_program,
        accounts,
        data,
    })
}

/// MessageTransmitter `get_nonce_pda` view call, run through simulation
pub fn get_nonce_pda(
    message_transmitter_program: &Pubkey,
    message_transmitter_state: &Pubkey,
    nonce: u64,
    source_domain: u32,
) -> Result<Instruction> {
    let data = anchor_data(
        "get_nonce_pda",
        &GetNoncePdaParams {
            nonce,
            source_domain,
        },
    )?;

    Ok(Instruction {
        program_id: *message_transmitter_program,
        accounts: vec![AccountMeta::new_readonly(*message_transmitter_state, false)],
        data,
    })
}

/// CreateAssociatedTokenAccount for `owner`/`mint`, paid by `payer`
pub fn create_associated_token_account(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    let ata = associated_token_address(owner, mint);

    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data: vec![],
    }
}

/// SPL Token `Transfer` of `amount` base units
pub fn spl_transfer(source: &Pubkey, destination: &Pubkey, authority: &Pubkey, amount: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(SPL_TRANSFER_TAG);
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data,
    }
}
