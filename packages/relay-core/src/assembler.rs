//! Transaction Assembler
//!
//! Builds unsigned call sequences. Nothing here signs or submits:
//!
//! - [`build_burn_transaction`] - optional `approve`, then `depositForBurn`
//! - [`build_redeem_transaction`] - one `receiveMessage` call on EVM, or the
//!   Solana instruction sequence plus its submission plan

use alloy::primitives::U256;
use serde::Serialize;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::address_codec::{evm_address_to_bytes32, is_evm_address, parse_bytes32, parse_evm_address, parse_solana_pubkey};
use crate::attestation::Attestation;
use crate::derivation::{redemption_model, DerivedAccountSet};
use crate::error::{RelayError, Result};
use crate::evm::calls::{approve_call, deposit_for_burn_call, EvmCall};
use crate::message::MessageEnvelope;
use crate::registry::{ChainContracts, ChainDescriptor};
use crate::solana::lookup_table::{LookupTableFlow, SizeLimits};
use crate::solana::pda::associated_token_address;

/// Parse a decimal amount in the token's smallest unit.
///
/// Rejects zero, signs, decimals and anything else that is not a positive
/// integer.
pub fn parse_amount(amount: &str) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RelayError::InvalidAmount(format!(
            "'{}' is not a positive integer",
            amount
        )));
    }
    let value = U256::from_str_radix(trimmed, 10)
        .map_err(|e| RelayError::InvalidAmount(format!("'{}': {}", amount, e)))?;
    if value.is_zero() {
        return Err(RelayError::InvalidAmount("amount must be greater than zero".to_string()));
    }
    Ok(value)
}

/// Encode a recipient as the 32-byte `mintRecipient` for `destination`.
///
/// EVM addresses are left-padded. On Solana a base58 wallet maps to its
/// USDC associated token account. A 0x-prefixed 32-byte value is taken
/// as already encoded on either chain.
pub fn encode_mint_recipient(destination: &ChainDescriptor, recipient: &str) -> Result<[u8; 32]> {
    let recipient = recipient.trim();
    match &destination.contracts {
        ChainContracts::Evm { .. } => {
            if is_evm_address(recipient) {
                Ok(evm_address_to_bytes32(&parse_evm_address(recipient)?))
            } else {
                parse_bytes32(recipient)
            }
        }
        ChainContracts::Solana { usdc_mint, .. } => {
            if recipient.starts_with("0x") {
                return parse_bytes32(recipient);
            }
            let owner = parse_solana_pubkey(recipient)?;
            Ok(associated_token_address(&owner, usdc_mint).to_bytes())
        }
    }
}

/// Build the burn side: `[approve?, depositForBurn]`.
///
/// `allowance` is the token allowance `sender` currently grants the
/// TokenMessenger; the approve call is emitted only when it is short.
pub fn build_burn_transaction(
    source: &ChainDescriptor,
    destination: &ChainDescriptor,
    sender: alloy::primitives::Address,
    mint_recipient: [u8; 32],
    amount: U256,
    allowance: U256,
) -> Result<Vec<EvmCall>> {
    if amount.is_zero() {
        return Err(RelayError::InvalidAmount("amount must be greater than zero".to_string()));
    }
    if source.domain == destination.domain {
        return Err(RelayError::UnsupportedRoute(format!(
            "{} and {} share domain {}",
            source.name, destination.name, source.domain
        )));
    }
    let ChainContracts::Evm {
        token_messenger,
        usdc,
        ..
    } = &source.contracts
    else {
        return Err(RelayError::UnsupportedRoute(format!(
            "burns from {} are not supported",
            source.name
        )));
    };

    let mut calls = Vec::with_capacity(2);
    if allowance < amount {
        debug!(
            sender = %sender,
            allowance = %allowance,
            amount = %amount,
            "Allowance short, adding approve"
        );
        calls.push(approve_call(*usdc, *token_messenger, amount));
    }
    calls.push(deposit_for_burn_call(
        *token_messenger,
        amount,
        destination.domain,
        mint_recipient,
        *usdc,
    ));

    info!(
        source = %source.name,
        destination = %destination.name,
        amount = %amount,
        calls = calls.len(),
        "Built burn transaction"
    );
    Ok(calls)
}

/// Caller-controlled knobs for the Solana redeem
#[derive(Debug, Clone, Default)]
pub struct RedeemOptions {
    /// Signs and pays for the Solana transactions
    pub fee_payer: Option<Pubkey>,
    /// Prepend an associated-token-account creation
    pub create_recipient_account: bool,
    /// Token units moved from the recipient to the fee payer after the mint
    pub relayer_fee: Option<u64>,
    pub size_limits: SizeLimits,
}

/// How a Solana redeem must be submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubmitPlan {
    /// One legacy transaction carrying every instruction
    Single,
    /// Stage a lookup table first, then send a v0 transaction
    LookupTable(LookupTableFlow),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolanaRedemption {
    pub payer: Pubkey,
    pub instructions: Vec<Instruction>,
    pub plan: SubmitPlan,
}

impl SolanaRedemption {
    pub fn requires_lookup_table(&self) -> bool {
        matches!(self.plan, SubmitPlan::LookupTable(_))
    }
}

/// Destination-side steps for one message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chain", content = "steps", rename_all = "snake_case")]
pub enum RedemptionTransaction {
    Evm(Vec<EvmCall>),
    Solana(SolanaRedemption),
}

/// Build the destination side from a complete attestation.
///
/// Fails with `AttestationIncomplete` before touching anything else when
/// `attestation` is not complete and signed.
pub fn build_redeem_transaction(
    destination: &ChainDescriptor,
    envelope: &MessageEnvelope,
    attestation: &Attestation,
    accounts: &DerivedAccountSet,
    options: &RedeemOptions,
) -> Result<RedemptionTransaction> {
    let signature = attestation.require_signature()?;
    if envelope.destination_domain != destination.domain {
        return Err(RelayError::DerivationFailure(format!(
            "message targets domain {}, {} is domain {}",
            envelope.destination_domain, destination.name, destination.domain
        )));
    }

    let tx = redemption_model(destination).assemble_redeem(envelope, signature, accounts, options)?;
    info!(
        destination = %destination.name,
        source_domain = envelope.source_domain,
        nonce = envelope.nonce,
        "Built redeem transaction"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestationStatus;
    use crate::derivation::{derive_accounts, DerivationInput};
    use crate::message::BurnMessage;
    use crate::registry::ChainRegistry;
    use alloy::primitives::Address;

    fn complete(signature: Vec<u8>) -> Attestation {
        Attestation {
            message_hash: None,
            status: AttestationStatus::Complete,
            signature: Some(signature),
            message: None,
            error: None,
        }
    }

    fn envelope(source: u32, destination: u32, nonce: u64, mint_recipient: [u8; 32]) -> MessageEnvelope {
        let body = BurnMessage {
            version: 0,
            burn_token: [0x11; 32],
            mint_recipient,
            amount: U256::from(1_000_000u64),
            message_sender: [0x22; 32],
        }
        .encode();
        let raw = MessageEnvelope::encode(0, source, destination, nonce, [0x01; 32], [0x02; 32], [0; 32], &body);
        MessageEnvelope::decode(&raw).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1000000").unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_amount(" 42 ").unwrap(), U256::from(42u64));
        for bad in ["0", "-5", "", "1.5", "abc", "+3", "0x10"] {
            assert!(
                matches!(parse_amount(bad), Err(RelayError::InvalidAmount(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_burn_with_and_without_approve() {
        let registry = ChainRegistry::mainnet();
        let base = registry.get("base").unwrap();
        let eth = registry.get("ethereum").unwrap();
        let amount = U256::from(1_000_000u64);
        let recipient = encode_mint_recipient(eth, "0x000000000000000000000000000000000000dEaD").unwrap();
        assert_eq!(&recipient[..12], &[0u8; 12]);

        let calls = build_burn_transaction(base, eth, Address::repeat_byte(7), recipient, amount, U256::ZERO).unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].description.starts_with("approve"));
        assert!(calls[1].description.starts_with("depositForBurn"));

        let calls = build_burn_transaction(base, eth, Address::repeat_byte(7), recipient, amount, amount).unwrap();
        assert_eq!(calls.len(), 1);

        let calls =
            build_burn_transaction(base, eth, Address::repeat_byte(7), recipient, amount, amount * U256::from(2u64))
                .unwrap();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_burn_rejects_zero_and_solana_source() {
        let registry = ChainRegistry::mainnet();
        let base = registry.get("base").unwrap();
        let solana = registry.get("solana").unwrap();
        assert!(matches!(
            build_burn_transaction(base, solana, Address::ZERO, [1; 32], U256::ZERO, U256::ZERO),
            Err(RelayError::InvalidAmount(_))
        ));
        assert!(matches!(
            build_burn_transaction(solana, base, Address::ZERO, [1; 32], U256::from(1u64), U256::ZERO),
            Err(RelayError::UnsupportedRoute(_))
        ));
    }

    #[test]
    fn test_solana_recipient_maps_to_ata() {
        let registry = ChainRegistry::mainnet();
        let solana = registry.get("solana").unwrap();
        let owner = Pubkey::new_unique();
        let encoded = encode_mint_recipient(solana, &owner.to_string()).unwrap();
        assert_eq!(
            encoded,
            associated_token_address(&owner, &crate::registry::SOLANA_USDC_MINT).to_bytes()
        );
    }

    #[test]
    fn test_redeem_requires_complete_attestation() {
        let registry = ChainRegistry::mainnet();
        let eth = registry.get("ethereum").unwrap();
        let env = envelope(6, 0, 9, [0x44; 32]);
        let accounts = derive_accounts(
            eth,
            &DerivationInput {
                local_token: None,
                source_domain: 6,
                destination_domain: 0,
                remote_token: [0x11; 32],
                nonce: 9,
                mint_recipient: [0x44; 32],
                recipient_owner: None,
                used_nonces_hint: None,
            },
        )
        .unwrap();

        let pending = Attestation::pending(None);
        assert!(matches!(
            build_redeem_transaction(eth, &env, &pending, &accounts, &RedeemOptions::default()),
            Err(RelayError::AttestationIncomplete)
        ));

        let tx = build_redeem_transaction(eth, &env, &complete(vec![7; 65]), &accounts, &RedeemOptions::default())
            .unwrap();
        let RedemptionTransaction::Evm(calls) = tx else {
            panic!("expected EVM calls");
        };
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].description, "receiveMessage");
    }

    #[test]
    fn test_solana_redeem_sequence() {
        let registry = ChainRegistry::mainnet();
        let solana = registry.get("solana").unwrap();
        let owner = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let ata = associated_token_address(&owner, &crate::registry::SOLANA_USDC_MINT).to_bytes();
        let env = envelope(6, 5, 12, ata);
        let accounts = derive_accounts(
            solana,
            &DerivationInput {
                local_token: None,
                source_domain: 6,
                destination_domain: 5,
                remote_token: [0x11; 32],
                nonce: 12,
                mint_recipient: ata,
                recipient_owner: Some(owner),
                used_nonces_hint: None,
            },
        )
        .unwrap();

        let options = RedeemOptions {
            fee_payer: Some(payer),
            create_recipient_account: true,
            relayer_fee: Some(1_000),
            size_limits: SizeLimits::default(),
        };
        let tx = build_redeem_transaction(solana, &env, &complete(vec![7; 130]), &accounts, &options).unwrap();
        let RedemptionTransaction::Solana(redemption) = tx else {
            panic!("expected Solana redemption");
        };
        assert_eq!(redemption.instructions.len(), 3);
        assert_eq!(redemption.instructions[0].program_id, crate::solana::pda::ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(redemption.instructions[1].program_id, crate::registry::SOLANA_MESSAGE_TRANSMITTER_PROGRAM);
        assert_eq!(redemption.instructions[2].program_id, crate::solana::pda::TOKEN_PROGRAM_ID);
    }

    #[test]
    fn test_solana_redeem_falls_back_to_lookup_table() {
        let registry = ChainRegistry::mainnet();
        let solana = registry.get("solana").unwrap();
        let env = envelope(6, 5, 12, [0x44; 32]);
        let accounts = derive_accounts(
            solana,
            &DerivationInput {
                local_token: None,
                source_domain: 6,
                destination_domain: 5,
                remote_token: [0x11; 32],
                nonce: 12,
                mint_recipient: [0x44; 32],
                recipient_owner: None,
                used_nonces_hint: None,
            },
        )
        .unwrap();

        let options = RedeemOptions {
            fee_payer: Some(Pubkey::new_unique()),
            size_limits: SizeLimits {
                max_transaction_bytes: 1232,
                max_static_accounts: 10,
            },
            ..RedeemOptions::default()
        };
        let tx = build_redeem_transaction(solana, &env, &complete(vec![7; 65]), &accounts, &options).unwrap();
        let RedemptionTransaction::Solana(redemption) = tx else {
            panic!("expected Solana redemption");
        };
        assert!(redemption.requires_lookup_table());
    }

    #[test]
    fn test_relayer_fee_larger_than_mint_rejected() {
        let registry = ChainRegistry::mainnet();
        let solana = registry.get("solana").unwrap();
        let owner = Pubkey::new_unique();
        let ata = associated_token_address(&owner, &crate::registry::SOLANA_USDC_MINT).to_bytes();
        let env = envelope(6, 5, 3, ata);
        let accounts = derive_accounts(
            solana,
            &DerivationInput {
                local_token: None,
                source_domain: 6,
                destination_domain: 5,
                remote_token: [0x11; 32],
                nonce: 3,
                mint_recipient: ata,
                recipient_owner: Some(owner),
                used_nonces_hint: None,
            },
        )
        .unwrap();
        let options = RedeemOptions {
            fee_payer: Some(Pubkey::new_unique()),
            relayer_fee: Some(2_000_000),
            ..RedeemOptions::default()
        };
        assert!(matches!(
            build_redeem_transaction(solana, &env, &complete(vec![7; 65]), &accounts, &options),
            Err(RelayError::InvalidAmount(_))
        ));
    }
}
