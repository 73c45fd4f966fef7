//! EVM JSON-RPC reader
//!
//! Serves both roles: burn receipts and allowances on the source chain,
//! `usedNonces` lookups on the destination chain.

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::{debug, info};

use super::contracts::{MessageTransmitter, ERC20};
use crate::chain::{DestinationChainReader, SourceChainReader};
use crate::derivation::DerivedAccountSet;
use crate::error::{RelayError, Result};
use crate::hash::used_nonce_key;
use crate::message::{BurnReceipt, ReceiptLog};
use crate::registry::{ChainContracts, ChainDescriptor};

/// Read-only client for one EVM chain
pub struct EvmReader {
    provider: RootProvider<Http<Client>>,
    chain_name: String,
    message_transmitter: Address,
}

impl EvmReader {
    pub fn new(chain: &ChainDescriptor) -> Result<Self> {
        let ChainContracts::Evm {
            message_transmitter,
            ..
        } = &chain.contracts
        else {
            return Err(RelayError::Config(format!("{} is not an EVM chain", chain.name)));
        };

        let rpc_url = chain.require_rpc_url()?;
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| RelayError::Config(format!("invalid RPC URL for {}: {}", chain.name, e)))?,
        );

        info!(chain = %chain.name, domain = chain.domain, "Created EVM reader");

        Ok(Self {
            provider,
            chain_name: chain.name.clone(),
            message_transmitter: *message_transmitter,
        })
    }

    fn rpc_error(&self, what: &str, e: impl std::fmt::Display) -> RelayError {
        RelayError::Rpc(format!("{} on {}: {}", what, self.chain_name, e))
    }
}

#[async_trait]
impl SourceChainReader for EvmReader {
    async fn burn_receipt(&self, tx_hash: B256) -> Result<BurnReceipt> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.rpc_error("eth_getTransactionReceipt", e))?
            .ok_or_else(|| RelayError::ReceiptNotFound {
                tx_hash: tx_hash.to_string(),
            })?;

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| ReceiptLog {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
            })
            .collect::<Vec<_>>();

        debug!(
            chain = %self.chain_name,
            tx_hash = %tx_hash,
            logs = logs.len(),
            "Fetched burn receipt"
        );

        Ok(BurnReceipt {
            tx_hash,
            success: receipt.status(),
            logs,
        })
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let contract = ERC20::new(token, &self.provider);
        let allowance = contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| self.rpc_error("allowance", e))?;
        Ok(allowance._0)
    }
}

#[async_trait]
impl DestinationChainReader for EvmReader {
    async fn is_nonce_used(
        &self,
        source_domain: u32,
        nonce: u64,
        _accounts: &DerivedAccountSet,
    ) -> Result<bool> {
        let contract = MessageTransmitter::new(self.message_transmitter, &self.provider);
        let used = contract
            .usedNonces(B256::from(used_nonce_key(source_domain, nonce)))
            .call()
            .await
            .map_err(|e| self.rpc_error("usedNonces", e))?;
        Ok(used._0 != U256::ZERO)
    }

    /// EVM recipients need no account creation
    async fn recipient_account_exists(&self, _account: &[u8; 32]) -> Result<bool> {
        Ok(true)
    }
}
