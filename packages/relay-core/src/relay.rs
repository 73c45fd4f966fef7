//! Relay Orchestrator
//!
//! Sequences codec, attestation, derivation and assembly into the two public
//! operations:
//!
//! - [`Relay::send`] - unsigned burn calls for the caller to sign
//! - [`Relay::redeem`] - unsigned redeem steps, or `None` while the
//!   attestation is not ready (or the nonce was already redeemed)
//!
//! A `Relay` holds no per-call state; concurrent calls are independent.

use alloy::primitives::Address;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address_codec::{parse_evm_address, parse_solana_pubkey, parse_tx_hash};
use crate::assembler::{
    build_burn_transaction, build_redeem_transaction, encode_mint_recipient, parse_amount,
    RedeemOptions, RedemptionTransaction,
};
use crate::attestation::{Attestation, AttestationPoller, AttestationProvider, AttestationQuery, AttestationStatus};
use crate::chain::ChainReaders;
use crate::derivation::{derive_accounts, DerivationInput};
use crate::error::{RelayError, Result};
use crate::evm::calls::EvmCall;
use crate::message::{extract_message, MessageEnvelope};
use crate::registry::{ChainContracts, ChainDescriptor, ChainRegistry};
use crate::solana::lookup_table::SizeLimits;
use solana_sdk::pubkey::Pubkey;

/// Orchestrator settings that apply to every call
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// Solana fee payer; required to redeem on Solana
    pub fee_payer: Option<Pubkey>,
    /// Token units forwarded to the fee payer after a Solana mint
    pub relayer_fee: Option<u64>,
    pub size_limits: SizeLimits,
    /// Cross-check the offline used-nonces derivation with the on-chain view
    pub verify_nonce_pda_onchain: bool,
}

/// Redeem request for one burn transaction
#[derive(Debug, Clone)]
pub struct RedeemRequest {
    pub source_chain: String,
    pub destination_chain: String,
    pub burn_tx_hash: String,
    /// Base58 wallet owning the Solana mint recipient
    pub recipient_owner: Option<String>,
}

/// The relay engine
pub struct Relay {
    registry: Arc<ChainRegistry>,
    attestation: Arc<dyn AttestationProvider>,
    readers: Arc<dyn ChainReaders>,
    poller: AttestationPoller,
    options: RelayOptions,
}

/// Message and attestation resolved from a burn transaction
struct Resolved<'a> {
    destination: &'a ChainDescriptor,
    envelope: MessageEnvelope,
}

impl Relay {
    pub fn new(
        registry: Arc<ChainRegistry>,
        attestation: Arc<dyn AttestationProvider>,
        readers: Arc<dyn ChainReaders>,
    ) -> Self {
        Self {
            registry,
            attestation,
            readers,
            poller: AttestationPoller::default(),
            options: RelayOptions::default(),
        }
    }

    pub fn with_poller(mut self, poller: AttestationPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_options(mut self, options: RelayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Build the burn calls moving `amount` from `sender` on `source_chain`
    /// to `recipient` on `destination_chain`.
    ///
    /// The amount and addresses are validated before any network call.
    pub async fn send(
        &self,
        sender: &str,
        recipient: &str,
        source_chain: &str,
        destination_chain: &str,
        amount: &str,
    ) -> Result<Vec<EvmCall>> {
        let amount = parse_amount(amount)?;
        let source = self.registry.get(source_chain)?;
        let destination = self.registry.get(destination_chain)?;

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
        let sender: Address = parse_evm_address(sender)?;
        let mint_recipient = encode_mint_recipient(destination, recipient)?;

        let reader = self.readers.source(source)?;
        let allowance = reader.allowance(*usdc, sender, *token_messenger).await?;
        debug!(chain = %source.name, sender = %sender, allowance = %allowance, "Fetched allowance");

        build_burn_transaction(source, destination, sender, mint_recipient, amount, allowance)
    }

    /// Build the redeem steps for a burn, querying the attestation once.
    ///
    /// `Ok(None)` means retry later: the attestation is still pending, or the
    /// destination already recorded the nonce.
    pub async fn redeem(&self, request: &RedeemRequest) -> Result<Option<RedemptionTransaction>> {
        let resolved = self.resolve(request).await?;
        let query = AttestationQuery::ByMessageHash(resolved.envelope.message_hash());
        let attestation = self.attestation.get_attestation(&query).await;

        match attestation.status {
            AttestationStatus::Complete if attestation.signature.is_some() => {}
            AttestationStatus::Error => {
                return Err(RelayError::AttestationError(
                    attestation.error.unwrap_or_else(|| "unknown error".to_string()),
                ));
            }
            _ => {
                info!(query = %query, "Attestation not ready");
                return Ok(None);
            }
        }

        self.assemble(request, &resolved, &attestation).await
    }

    /// Like [`Relay::redeem`], but polls the attestation until it completes,
    /// the poll deadline passes, or `cancel` resolves.
    pub async fn redeem_when_ready<C>(
        &self,
        request: &RedeemRequest,
        cancel: C,
    ) -> Result<Option<RedemptionTransaction>>
    where
        C: Future<Output = ()>,
    {
        let resolved = self.resolve(request).await?;
        let query = AttestationQuery::ByMessageHash(resolved.envelope.message_hash());
        let attestation = self.poller.poll(self.attestation.as_ref(), &query, cancel).await?;
        self.assemble(request, &resolved, &attestation).await
    }

    async fn resolve(&self, request: &RedeemRequest) -> Result<Resolved<'_>> {
        let source = self.registry.get(&request.source_chain)?;
        let destination = self.registry.get(&request.destination_chain)?;
        let tx_hash = parse_tx_hash(&request.burn_tx_hash)?;

        let ChainContracts::Evm {
            message_transmitter,
            ..
        } = &source.contracts
        else {
            return Err(RelayError::UnsupportedRoute(format!(
                "burns from {} are not supported",
                source.name
            )));
        };

        let receipt = self.readers.source(source)?.burn_receipt(tx_hash).await?;
        if !receipt.success {
            warn!(tx_hash = %tx_hash, "Burn transaction reverted");
            return Err(RelayError::MessageNotFound {
                tx_hash: tx_hash.to_string(),
            });
        }
        let envelope = extract_message(&receipt, Some(*message_transmitter))?;

        if envelope.source_domain != source.domain || envelope.destination_domain != destination.domain {
            return Err(RelayError::DomainMismatch {
                source_domain: envelope.source_domain,
                destination_domain: envelope.destination_domain,
                expected_source: source.domain,
                expected_destination: destination.domain,
            });
        }

        info!(
            source = %source.name,
            destination = %destination.name,
            nonce = envelope.nonce,
            "Resolved burn message"
        );

        Ok(Resolved { destination, envelope })
    }

    async fn assemble(
        &self,
        request: &RedeemRequest,
        resolved: &Resolved<'_>,
        attestation: &Attestation,
    ) -> Result<Option<RedemptionTransaction>> {
        let destination = resolved.destination;
        let envelope = &resolved.envelope;
        let burn = envelope.burn_message()?;
        let reader = self.readers.destination(destination)?;

        let recipient_owner = request
            .recipient_owner
            .as_deref()
            .map(parse_solana_pubkey)
            .transpose()?;

        let used_nonces_hint = if self.options.verify_nonce_pda_onchain && destination.is_solana() {
            reader
                .used_nonces_view(envelope.source_domain, envelope.nonce)
                .await?
        } else {
            None
        };

        let accounts = derive_accounts(
            destination,
            &DerivationInput {
                local_token: None,
                source_domain: envelope.source_domain,
                destination_domain: envelope.destination_domain,
                remote_token: burn.burn_token,
                nonce: envelope.nonce,
                mint_recipient: burn.mint_recipient,
                recipient_owner,
                used_nonces_hint,
            },
        )?;

        if reader
            .is_nonce_used(envelope.source_domain, envelope.nonce, &accounts)
            .await?
        {
            info!(
                destination = %destination.name,
                source_domain = envelope.source_domain,
                nonce = envelope.nonce,
                "Nonce already used, nothing to redeem"
            );
            return Ok(None);
        }

        let create_recipient_account = destination.is_solana()
            && !reader.recipient_account_exists(&burn.mint_recipient).await?;

        let options = RedeemOptions {
            fee_payer: self.options.fee_payer,
            create_recipient_account,
            relayer_fee: self.options.relayer_fee,
            size_limits: self.options.size_limits,
        };

        build_redeem_transaction(destination, envelope, attestation, &accounts, &options).map(Some)
    }
}
