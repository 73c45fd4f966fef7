//! Chain reader seams
//!
//! The relay only ever reads from chains. Source chains supply burn receipts
//! and allowances; destination chains answer "has this nonce been used" and
//! "does the recipient token account exist". Implementations live in
//! [`crate::evm::client`] and [`crate::solana::client`]; tests plug in fakes.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::sync::Arc;

use crate::derivation::DerivedAccountSet;
use crate::error::{RelayError, Result};
use crate::message::BurnReceipt;
use crate::registry::{ChainContracts, ChainDescriptor};

/// Read access to a burn (source) chain
#[async_trait]
pub trait SourceChainReader: Send + Sync {
    /// Receipt of a mined burn transaction; `ReceiptNotFound` if unknown
    async fn burn_receipt(&self, tx_hash: B256) -> Result<BurnReceipt>;

    /// ERC20 allowance granted by `owner` to `spender`
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
}

/// Read access to a mint (destination) chain
#[async_trait]
pub trait DestinationChainReader: Send + Sync {
    /// Whether the destination already recorded (source domain, nonce) as used
    async fn is_nonce_used(
        &self,
        source_domain: u32,
        nonce: u64,
        accounts: &DerivedAccountSet,
    ) -> Result<bool>;

    /// Whether the 32-byte recipient account exists on chain
    async fn recipient_account_exists(&self, account: &[u8; 32]) -> Result<bool>;

    /// Used-nonce marker reported by the chain itself, if it exposes one
    async fn used_nonces_view(&self, _source_domain: u32, _nonce: u64) -> Result<Option<[u8; 32]>> {
        Ok(None)
    }
}

/// Resolves readers for registry chains
pub trait ChainReaders: Send + Sync {
    fn source(&self, chain: &ChainDescriptor) -> Result<Arc<dyn SourceChainReader>>;
    fn destination(&self, chain: &ChainDescriptor) -> Result<Arc<dyn DestinationChainReader>>;
}

/// Builds JSON-RPC readers from each descriptor's endpoint
#[derive(Debug, Clone, Default)]
pub struct RpcChainReaders {
    /// Fee payer used to simulate Solana view calls
    pub solana_fee_payer: Option<solana_sdk::pubkey::Pubkey>,
}

impl ChainReaders for RpcChainReaders {
    fn source(&self, chain: &ChainDescriptor) -> Result<Arc<dyn SourceChainReader>> {
        match &chain.contracts {
            ChainContracts::Evm { .. } => Ok(Arc::new(crate::evm::client::EvmReader::new(chain)?)),
            ChainContracts::Solana { .. } => Err(RelayError::UnsupportedRoute(format!(
                "burns from {} are not supported",
                chain.name
            ))),
        }
    }

    fn destination(&self, chain: &ChainDescriptor) -> Result<Arc<dyn DestinationChainReader>> {
        match &chain.contracts {
            ChainContracts::Evm { .. } => Ok(Arc::new(crate::evm::client::EvmReader::new(chain)?)),
            ChainContracts::Solana { .. } => Ok(Arc::new(
                crate::solana::client::SolanaReader::new(chain, self.solana_fee_payer)?,
            )),
        }
    }
}
