//! Account Derivation Engine
//!
//! Chain polymorphism for redemption. A destination descriptor selects one
//! of two [`RedemptionModel`]s:
//!
//! - [`AddressModelChain`] - EVM. Derivation is the identity: the registry's
//!   MessageTransmitter and TokenMinter addresses.
//! - [`ProgramDerivedAddressModelChain`] - Solana. Every role is a PDA of
//!   the MessageTransmitter or TokenMessengerMinter program, re-verified
//!   against the registered program ids before it is returned.
//!
//! Derivation is pure: identical inputs give identical account sets.

use alloy::primitives::Address;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::assembler::{RedeemOptions, RedemptionTransaction, SolanaRedemption, SubmitPlan};
use crate::error::{RelayError, Result};
use crate::evm::calls::receive_message_call;
use crate::message::MessageEnvelope;
use crate::registry::{ChainContracts, ChainDescriptor};
use crate::solana::instructions;
use crate::solana::lookup_table::{check_transaction_size, LookupTableFlow};
use crate::solana::pda::{associated_token_address, ReceiveMessagePdas};

/// Inputs identifying one message's destination accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationInput {
    /// Destination token; `None` means the registry's USDC
    pub local_token: Option<[u8; 32]>,
    pub source_domain: u32,
    pub destination_domain: u32,
    /// BurnMessage.burnToken
    pub remote_token: [u8; 32],
    pub nonce: u64,
    /// BurnMessage.mintRecipient (the token account on Solana)
    pub mint_recipient: [u8; 32],
    /// Wallet owning `mint_recipient`, when the caller knows it
    pub recipient_owner: Option<Pubkey>,
    /// Used-nonces address reported by the chain's view call
    pub used_nonces_hint: Option<[u8; 32]>,
}

/// Program-derived accounts for one Solana redeem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDerivedAccounts {
    pub message_transmitter_program: Pubkey,
    pub token_messenger_minter_program: Pubkey,
    pub usdc_mint: Pubkey,
    pub pdas: ReceiveMessagePdas,
    pub user_token_account: Pubkey,
    pub recipient_owner: Option<Pubkey>,
}

/// Accounts needed to redeem one message on one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedAccountSet {
    AddressModel {
        message_transmitter: Address,
        token_minter: Address,
    },
    ProgramDerived(Box<ProgramDerivedAccounts>),
}

/// Per-architecture derivation and redeem assembly
pub trait RedemptionModel {
    fn chain(&self) -> &ChainDescriptor;

    fn derive_accounts(&self, input: &DerivationInput) -> Result<DerivedAccountSet>;

    /// Build the redeem steps from a verified signature
    fn assemble_redeem(
        &self,
        envelope: &MessageEnvelope,
        signature: &[u8],
        accounts: &DerivedAccountSet,
        options: &RedeemOptions,
    ) -> Result<RedemptionTransaction>;
}

/// Pick the model matching the descriptor's contracts
pub fn redemption_model(chain: &ChainDescriptor) -> Box<dyn RedemptionModel + '_> {
    match &chain.contracts {
        ChainContracts::Evm { .. } => Box::new(AddressModelChain { chain }),
        ChainContracts::Solana { .. } => Box::new(ProgramDerivedAddressModelChain { chain }),
    }
}

/// Derive the destination accounts for `input` on `chain`
pub fn derive_accounts(chain: &ChainDescriptor, input: &DerivationInput) -> Result<DerivedAccountSet> {
    if input.destination_domain != chain.domain {
        return Err(RelayError::DerivationFailure(format!(
            "message targets domain {}, {} is domain {}",
            input.destination_domain, chain.name, chain.domain
        )));
    }
    if let Some(token) = input.local_token {
        if token != chain.token_bytes32() {
            return Err(RelayError::DerivationFailure(format!(
                "token 0x{} is not registered on {}",
                hex::encode(token),
                chain.name
            )));
        }
    }
    redemption_model(chain).derive_accounts(input)
}

// ============================================================================
// Account model (EVM)
// ============================================================================

pub struct AddressModelChain<'a> {
    chain: &'a ChainDescriptor,
}

impl RedemptionModel for AddressModelChain<'_> {
    fn chain(&self) -> &ChainDescriptor {
        self.chain
    }

    fn derive_accounts(&self, _input: &DerivationInput) -> Result<DerivedAccountSet> {
        match &self.chain.contracts {
            ChainContracts::Evm {
                message_transmitter,
                token_minter,
                ..
            } => Ok(DerivedAccountSet::AddressModel {
                message_transmitter: *message_transmitter,
                token_minter: *token_minter,
            }),
            ChainContracts::Solana { .. } => Err(RelayError::DerivationFailure(format!(
                "{} has no static contract addresses",
                self.chain.name
            ))),
        }
    }

    fn assemble_redeem(
        &self,
        envelope: &MessageEnvelope,
        signature: &[u8],
        accounts: &DerivedAccountSet,
        _options: &RedeemOptions,
    ) -> Result<RedemptionTransaction> {
        let DerivedAccountSet::AddressModel {
            message_transmitter,
            ..
        } = accounts
        else {
            return Err(RelayError::DerivationFailure(format!(
                "{} expects static contract addresses",
                self.chain.name
            )));
        };

        Ok(RedemptionTransaction::Evm(vec![receive_message_call(
            *message_transmitter,
            &envelope.raw,
            signature,
        )]))
    }
}

// ============================================================================
// Program-derived-address model (Solana)
// ============================================================================

pub struct ProgramDerivedAddressModelChain<'a> {
    chain: &'a ChainDescriptor,
}

impl ProgramDerivedAddressModelChain<'_> {
    fn programs(&self) -> Result<(Pubkey, Pubkey, Pubkey)> {
        match &self.chain.contracts {
            ChainContracts::Solana {
                message_transmitter_program,
                token_messenger_minter_program,
                usdc_mint,
            } => Ok((
                *message_transmitter_program,
                *token_messenger_minter_program,
                *usdc_mint,
            )),
            ChainContracts::Evm { .. } => Err(RelayError::DerivationFailure(format!(
                "{} has no program ids",
                self.chain.name
            ))),
        }
    }
}

impl RedemptionModel for ProgramDerivedAddressModelChain<'_> {
    fn chain(&self) -> &ChainDescriptor {
        self.chain
    }

    fn derive_accounts(&self, input: &DerivationInput) -> Result<DerivedAccountSet> {
        let (mt, tmm, mint) = self.programs()?;

        let pdas = ReceiveMessagePdas::derive(
            &mt,
            &tmm,
            &mint,
            input.source_domain,
            &input.remote_token,
            input.nonce,
        )?;
        pdas.verify(&mt, &tmm)?;

        if let Some(hint) = input.used_nonces_hint {
            let hinted = Pubkey::new_from_array(hint);
            if hinted.is_on_curve() {
                return Err(RelayError::DerivationFailure(format!(
                    "used-nonces account {} is on the ed25519 curve",
                    hinted
                )));
            }
            if hinted != pdas.used_nonces.address {
                return Err(RelayError::DerivationFailure(format!(
                    "chain reports used-nonces account {}, derived {}",
                    hinted, pdas.used_nonces.address
                )));
            }
        }

        let user_token_account = Pubkey::new_from_array(input.mint_recipient);
        if let Some(owner) = input.recipient_owner {
            let expected = associated_token_address(&owner, &mint);
            if expected != user_token_account {
                return Err(RelayError::DerivationFailure(format!(
                    "mint recipient {} is not the token account of {} ({})",
                    user_token_account, owner, expected
                )));
            }
        }

        debug!(
            chain = %self.chain.name,
            source_domain = input.source_domain,
            nonce = input.nonce,
            used_nonces = %pdas.used_nonces.address,
            custody = %pdas.custody.address,
            "Derived receive_message accounts"
        );

        Ok(DerivedAccountSet::ProgramDerived(Box::new(ProgramDerivedAccounts {
            message_transmitter_program: mt,
            token_messenger_minter_program: tmm,
            usdc_mint: mint,
            pdas,
            user_token_account,
            recipient_owner: input.recipient_owner,
        })))
    }

    fn assemble_redeem(
        &self,
        envelope: &MessageEnvelope,
        signature: &[u8],
        accounts: &DerivedAccountSet,
        options: &RedeemOptions,
    ) -> Result<RedemptionTransaction> {
        let DerivedAccountSet::ProgramDerived(derived) = accounts else {
            return Err(RelayError::DerivationFailure(format!(
                "{} expects program-derived accounts",
                self.chain.name
            )));
        };
        let payer = options.fee_payer.ok_or_else(|| {
            RelayError::Config("a Solana fee payer is required to redeem on Solana".to_string())
        })?;

        let mut ixs = Vec::with_capacity(3);

        if options.create_recipient_account {
            let owner = derived.recipient_owner.ok_or_else(|| {
                RelayError::InvalidAddress(
                    "recipient token account is missing and its owner is unknown".to_string(),
                )
            })?;
            ixs.push(instructions::create_associated_token_account(
                &payer,
                &owner,
                &derived.usdc_mint,
            ));
        }

        ixs.push(instructions::receive_message(
            &derived.message_transmitter_program,
            &derived.token_messenger_minter_program,
            &payer,
            &derived.pdas,
            &derived.user_token_account,
            &envelope.raw,
            signature,
        )?);

        if let Some(fee) = options.relayer_fee.filter(|&fee| fee > 0) {
            let owner = derived.recipient_owner.ok_or_else(|| {
                RelayError::InvalidAddress("relayer fee requires the recipient owner".to_string())
            })?;
            let minted = envelope.burn_message()?.amount;
            if alloy::primitives::U256::from(fee) > minted {
                return Err(RelayError::InvalidAmount(format!(
                    "relayer fee {} exceeds minted amount {}",
                    fee, minted
                )));
            }
            let payer_token_account = associated_token_address(&payer, &derived.usdc_mint);
            ixs.push(instructions::spl_transfer(
                &derived.user_token_account,
                &payer_token_account,
                &owner,
                fee,
            ));
        }

        let plan = match check_transaction_size(&payer, &ixs, &options.size_limits) {
            Ok(()) => SubmitPlan::Single,
            Err(RelayError::InstructionSizeExceeded {
                size,
                limit,
                accounts,
                account_limit,
            }) => {
                info!(
                    size = size,
                    limit = limit,
                    accounts = accounts,
                    account_limit = account_limit,
                    "Redeem exceeds single transaction limits, planning lookup table"
                );
                SubmitPlan::LookupTable(LookupTableFlow::new(payer, ixs.clone()))
            }
            Err(e) => return Err(e),
        };

        Ok(RedemptionTransaction::Solana(SolanaRedemption {
            payer,
            instructions: ixs,
            plan,
        }))
    }
}
