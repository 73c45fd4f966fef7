//! Solana RPC reader
//!
//! Destination-side reads for the resource-model chain, plus the slot,
//! blockhash and finality queries the lookup-table flow needs.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::instructions;
use super::lookup_table::Confirmation;
use super::pda::{self, Pda};
use crate::chain::DestinationChainReader;
use crate::derivation::DerivedAccountSet;
use crate::error::{RelayError, Result};
use crate::registry::{ChainContracts, ChainDescriptor};

/// Nonblocking RPC reader for the Solana destination
pub struct SolanaReader {
    rpc: RpcClient,
    message_transmitter_program: Pubkey,
    /// Needed to simulate view calls; without it the view call is skipped
    fee_payer: Option<Pubkey>,
}

impl SolanaReader {
    pub fn new(chain: &ChainDescriptor, fee_payer: Option<Pubkey>) -> Result<Self> {
        let ChainContracts::Solana {
            message_transmitter_program,
            ..
        } = &chain.contracts
        else {
            return Err(RelayError::Config(format!("{} is not a Solana chain", chain.name)));
        };

        let rpc_url = chain.require_rpc_url()?;
        let rpc = RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());

        info!(chain = %chain.name, domain = chain.domain, "Created Solana reader");

        Ok(Self {
            rpc,
            message_transmitter_program: *message_transmitter_program,
            fee_payer,
        })
    }

    /// Current finalized slot
    pub async fn finalized_slot(&self) -> Result<u64> {
        self.rpc
            .get_slot_with_commitment(CommitmentConfig::finalized())
            .await
            .map_err(|e| RelayError::Rpc(format!("getSlot: {}", e)))
    }

    pub async fn latest_blockhash(&self) -> Result<Hash> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| RelayError::Rpc(format!("getLatestBlockhash: {}", e)))
    }

    /// Finality of a submitted transaction; `None` while the cluster has not
    /// seen it.
    pub async fn confirmation(&self, signature: &str) -> Result<Option<Confirmation>> {
        let signature = Signature::from_str(signature)
            .map_err(|e| RelayError::LookupTable(format!("invalid signature {}: {}", signature, e)))?;

        let statuses = self
            .rpc
            .get_signature_statuses(&[signature])
            .await
            .map_err(|e| RelayError::Rpc(format!("getSignatureStatuses: {}", e)))?;

        let Some(status) = statuses.value.into_iter().next().flatten() else {
            return Ok(None);
        };

        if let Some(err) = &status.err {
            return Err(RelayError::LookupTable(format!(
                "transaction {} failed: {}",
                signature, err
            )));
        }

        let finalized = matches!(
            status.confirmation_status,
            Some(TransactionConfirmationStatus::Finalized)
        );
        debug!(signature = %signature, slot = status.slot, finalized = finalized, "Signature status");

        Ok(Some(Confirmation {
            slot: status.slot,
            finalized,
        }))
    }

    /// Run `get_nonce_pda` through simulation and read its return data
    async fn simulate_nonce_pda(&self, payer: Pubkey, source_domain: u32, nonce: u64) -> Result<Pubkey> {
        let state = Pda::find(
            vec![b"message_transmitter".to_vec()],
            &self.message_transmitter_program,
        )?;
        let ix = instructions::get_nonce_pda(
            &self.message_transmitter_program,
            &state.address,
            nonce,
            source_domain,
        )?;
        let tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer)));

        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            ..RpcSimulateTransactionConfig::default()
        };
        let result = self
            .rpc
            .simulate_transaction_with_config(&tx, config)
            .await
            .map_err(|e| RelayError::DerivationFailure(format!("get_nonce_pda simulation: {}", e)))?
            .value;

        if let Some(err) = result.err {
            return Err(RelayError::DerivationFailure(format!(
                "get_nonce_pda failed: {}",
                err
            )));
        }

        let data = result
            .return_data
            .ok_or_else(|| RelayError::DerivationFailure("get_nonce_pda returned no data".to_string()))?;
        let bytes = STANDARD
            .decode(&data.data.0)
            .map_err(|e| RelayError::DerivationFailure(format!("get_nonce_pda return data: {}", e)))?;
        let raw: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            RelayError::DerivationFailure(format!(
                "get_nonce_pda returned {} bytes, expected 32",
                bytes.len()
            ))
        })?;
        Ok(Pubkey::new_from_array(raw))
    }
}

#[async_trait]
impl DestinationChainReader for SolanaReader {
    async fn is_nonce_used(
        &self,
        _source_domain: u32,
        nonce: u64,
        accounts: &DerivedAccountSet,
    ) -> Result<bool> {
        let DerivedAccountSet::ProgramDerived(derived) = accounts else {
            return Err(RelayError::DerivationFailure(
                "Solana destination requires program-derived accounts".to_string(),
            ));
        };

        let used_nonces = derived.pdas.used_nonces.address;
        let account = self
            .rpc
            .get_account_with_commitment(&used_nonces, CommitmentConfig::confirmed())
            .await
            .map_err(|e| RelayError::Rpc(format!("getAccountInfo {}: {}", used_nonces, e)))?
            .value;

        match account {
            // the program creates the bucket account on first use
            None => Ok(false),
            Some(account) => pda::is_nonce_used(&account.data, nonce),
        }
    }

    async fn recipient_account_exists(&self, account: &[u8; 32]) -> Result<bool> {
        let key = Pubkey::new_from_array(*account);
        let found = self
            .rpc
            .get_account_with_commitment(&key, CommitmentConfig::confirmed())
            .await
            .map_err(|e| RelayError::Rpc(format!("getAccountInfo {}: {}", key, e)))?
            .value;
        Ok(found.is_some())
    }

    async fn used_nonces_view(&self, source_domain: u32, nonce: u64) -> Result<Option<[u8; 32]>> {
        let Some(payer) = self.fee_payer else {
            warn!("No fee payer configured, skipping get_nonce_pda view call");
            return Ok(None);
        };
        let key = self.simulate_nonce_pda(payer, source_domain, nonce).await?;
        debug!(source_domain = source_domain, nonce = nonce, used_nonces = %key, "get_nonce_pda");
        Ok(Some(key.to_bytes()))
    }
}
