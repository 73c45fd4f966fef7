//! End-to-end relay tests with in-memory chains and attestation service

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use relay_core::address_codec::evm_address_to_bytes32;
use relay_core::message::{encode_abi_bytes, message_sent_topic};
use relay_core::solana::pda::used_nonces_seeds;
use relay_core::solana::{associated_token_address, Pda, Confirmation, FlowAction, LookupTablePhase, SizeLimits};
use relay_core::{
    Attestation, AttestationPoller, AttestationProvider, AttestationQuery, AttestationStatus,
    BurnMessage, BurnReceipt, ChainContracts, ChainDescriptor, ChainReaders, ChainRegistry,
    DerivedAccountSet, DestinationChainReader, MessageEnvelope, PollConfig, ReceiptLog,
    RedeemRequest, RedemptionTransaction, Relay, RelayError, RelayOptions, Result,
    SourceChainReader, SubmitPlan,
};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use tracing_subscriber::EnvFilter;

mod helpers {
    use super::*;

    /// In-memory source and destination chain state
    #[derive(Default)]
    pub struct FakeChains {
        pub receipts: Mutex<HashMap<B256, BurnReceipt>>,
        pub allowance: Mutex<U256>,
        pub used_nonces: Mutex<Vec<(u32, u64)>>,
        pub existing_accounts: Mutex<Vec<[u8; 32]>>,
        /// Answer of the on-chain used-nonces view, if the chain exposes one
        pub used_nonces_view: Mutex<Option<[u8; 32]>>,
        pub reads: AtomicUsize,
    }

    #[async_trait]
    impl SourceChainReader for FakeChains {
        async fn burn_receipt(&self, tx_hash: B256) -> Result<BurnReceipt> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.receipts
                .lock()
                .unwrap()
                .get(&tx_hash)
                .cloned()
                .ok_or_else(|| RelayError::ReceiptNotFound {
                    tx_hash: tx_hash.to_string(),
                })
        }

        async fn allowance(&self, _token: Address, _owner: Address, _spender: Address) -> Result<U256> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(*self.allowance.lock().unwrap())
        }
    }

    #[async_trait]
    impl DestinationChainReader for FakeChains {
        async fn is_nonce_used(
            &self,
            source_domain: u32,
            nonce: u64,
            _accounts: &DerivedAccountSet,
        ) -> Result<bool> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.used_nonces.lock().unwrap().contains(&(source_domain, nonce)))
        }

        async fn recipient_account_exists(&self, account: &[u8; 32]) -> Result<bool> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.existing_accounts.lock().unwrap().contains(account))
        }

        async fn used_nonces_view(&self, _source_domain: u32, _nonce: u64) -> Result<Option<[u8; 32]>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(*self.used_nonces_view.lock().unwrap())
        }
    }

    pub struct FakeReaders(pub Arc<FakeChains>);

    impl ChainReaders for FakeReaders {
        fn source(&self, _chain: &ChainDescriptor) -> Result<Arc<dyn SourceChainReader>> {
            Ok(self.0.clone())
        }

        fn destination(&self, _chain: &ChainDescriptor) -> Result<Arc<dyn DestinationChainReader>> {
            Ok(self.0.clone())
        }
    }

    /// Answers pending for the first `pending_for` queries, then `final_status`
    pub struct FakeIris {
        pub pending_for: usize,
        pub final_status: AttestationStatus,
        pub queries: AtomicUsize,
    }

    impl FakeIris {
        pub fn new(pending_for: usize, final_status: AttestationStatus) -> Self {
            Self {
                pending_for,
                final_status,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AttestationProvider for FakeIris {
        async fn get_attestation(&self, query: &AttestationQuery) -> Attestation {
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            let hash = match query {
                AttestationQuery::ByMessageHash(hash) => Some(*hash),
                AttestationQuery::ByTransaction { .. } => None,
            };
            if n < self.pending_for {
                return Attestation::pending(hash);
            }
            match self.final_status {
                AttestationStatus::Complete => Attestation {
                    message_hash: hash,
                    status: AttestationStatus::Complete,
                    signature: Some(vec![0x1b; 130]),
                    message: None,
                    error: None,
                },
                AttestationStatus::Error => Attestation::error(hash, "attester unavailable"),
                AttestationStatus::Pending => Attestation::pending(hash),
            }
        }
    }

    pub fn evm_contracts(chain: &ChainDescriptor) -> (Address, Address, Address) {
        match &chain.contracts {
            ChainContracts::Evm {
                token_messenger,
                message_transmitter,
                usdc,
                ..
            } => (*token_messenger, *message_transmitter, *usdc),
            ChainContracts::Solana { .. } => panic!("{} is not EVM", chain.name),
        }
    }

    /// A successful burn receipt carrying one MessageSent log
    pub fn burn_receipt(
        source: &ChainDescriptor,
        destination_domain: u32,
        nonce: u64,
        mint_recipient: [u8; 32],
        amount: u64,
        tx_hash: B256,
    ) -> BurnReceipt {
        let (token_messenger, message_transmitter, usdc) = evm_contracts(source);
        let body = BurnMessage {
            version: 0,
            burn_token: evm_address_to_bytes32(&usdc),
            mint_recipient,
            amount: U256::from(amount),
            message_sender: [0x77; 32],
        }
        .encode();
        let raw = MessageEnvelope::encode(
            0,
            source.domain,
            destination_domain,
            nonce,
            evm_address_to_bytes32(&token_messenger),
            [0x99; 32],
            [0; 32],
            &body,
        );

        BurnReceipt {
            tx_hash,
            success: true,
            logs: vec![ReceiptLog {
                address: message_transmitter,
                topics: vec![message_sent_topic()],
                data: encode_abi_bytes(&raw).into(),
            }],
        }
    }

    /// Route relay logs to the test harness; later calls are no-ops
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("relay_core=debug"))
            .with_test_writer()
            .try_init();
    }

    pub fn relay(chains: Arc<FakeChains>, iris: Arc<FakeIris>) -> Relay {
        Relay::new(
            Arc::new(ChainRegistry::mainnet()),
            iris,
            Arc::new(FakeReaders(chains)),
        )
    }
}

use helpers::*;

const SENDER: &str = "0x00000000000000000000000000000000000000aa";
const RECIPIENT: &str = "0x00000000000000000000000000000000000000bb";

fn request(source: &str, destination: &str, tx_hash: B256) -> RedeemRequest {
    RedeemRequest {
        source_chain: source.to_string(),
        destination_chain: destination.to_string(),
        burn_tx_hash: tx_hash.to_string(),
        recipient_owner: None,
    }
}

// ============================================================================
// SEND
// ============================================================================

#[tokio::test]
async fn test_send_approves_only_when_allowance_is_short() {
    let chains = Arc::new(FakeChains::default());
    let relay = relay(chains.clone(), Arc::new(FakeIris::new(0, AttestationStatus::Complete)));

    let calls = relay.send(SENDER, RECIPIENT, "base", "ethereum", "1000000").await.unwrap();
    assert_eq!(calls.len(), 2);

    let base = relay.registry().get("base").unwrap().clone();
    let (token_messenger, _, usdc) = evm_contracts(&base);
    assert_eq!(calls[0].to, usdc);
    assert_eq!(calls[1].to, token_messenger);
    // depositForBurn(amount, destinationDomain = 0, mintRecipient, burnToken)
    assert_eq!(U256::from_be_slice(&calls[1].data[4..36]), U256::from(1_000_000u64));
    assert_eq!(U256::from_be_slice(&calls[1].data[36..68]), U256::ZERO);
    assert_eq!(&calls[1].data[68..80], &[0u8; 12]);

    *chains.allowance.lock().unwrap() = U256::from(1_000_000u64);
    let calls = relay.send(SENDER, RECIPIENT, "base", "ethereum", "1000000").await.unwrap();
    assert_eq!(calls.len(), 1);

    *chains.allowance.lock().unwrap() = U256::from(5_000_000u64);
    let calls = relay.send(SENDER, RECIPIENT, "base", "ethereum", "1000000").await.unwrap();
    assert_eq!(calls.len(), 1);
}

#[tokio::test]
async fn test_send_invalid_amount_makes_no_reads() {
    let chains = Arc::new(FakeChains::default());
    let relay = relay(chains.clone(), Arc::new(FakeIris::new(0, AttestationStatus::Complete)));

    for amount in ["0", "-1000000"] {
        let err = relay.send(SENDER, RECIPIENT, "base", "ethereum", amount).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidAmount(_)));
    }
    assert_eq!(chains.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_send_from_solana_is_unsupported() {
    let chains = Arc::new(FakeChains::default());
    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete)));
    let err = relay.send(SENDER, RECIPIENT, "solana", "ethereum", "10").await.unwrap_err();
    assert!(matches!(err, RelayError::UnsupportedRoute(_)));
}

// ============================================================================
// REDEEM (EVM)
// ============================================================================

#[tokio::test]
async fn test_redeem_pending_then_complete() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let base = registry.get("base").unwrap();
    let tx_hash = B256::repeat_byte(0x01);
    chains
        .receipts
        .lock()
        .unwrap()
        .insert(tx_hash, burn_receipt(base, 0, 42, [0x0b; 32], 1_000_000, tx_hash));

    let iris = Arc::new(FakeIris::new(1, AttestationStatus::Complete));
    let relay = relay(chains, iris.clone());

    let first = tokio_test::assert_ok!(relay.redeem(&request("base", "ethereum", tx_hash)).await);
    assert!(first.is_none());

    let second = tokio_test::assert_ok!(relay.redeem(&request("base", "ethereum", tx_hash)).await);
    let Some(RedemptionTransaction::Evm(calls)) = second else {
        panic!("expected EVM redeem calls");
    };
    assert_eq!(calls.len(), 1);
    let (_, eth_transmitter, _) = evm_contracts(registry.get("ethereum").unwrap());
    assert_eq!(calls[0].to, eth_transmitter);
    assert_eq!(iris.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_redeem_attestation_error_is_an_error() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let tx_hash = B256::repeat_byte(0x02);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("base").unwrap(), 0, 1, [0x0b; 32], 10, tx_hash),
    );

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Error)));
    let err = relay.redeem(&request("base", "ethereum", tx_hash)).await.unwrap_err();
    assert!(matches!(err, RelayError::AttestationError(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_redeem_used_nonce_is_noop() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let tx_hash = B256::repeat_byte(0x03);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("base").unwrap(), 0, 7, [0x0b; 32], 10, tx_hash),
    );
    chains.used_nonces.lock().unwrap().push((6, 7));

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete)));
    let result = relay.redeem(&request("base", "ethereum", tx_hash)).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_redeem_wrong_destination() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let tx_hash = B256::repeat_byte(0x04);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("base").unwrap(), 3, 7, [0x0b; 32], 10, tx_hash),
    );

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete)));
    let err = relay.redeem(&request("base", "ethereum", tx_hash)).await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::DomainMismatch {
            destination_domain: 3,
            expected_destination: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn test_redeem_ignores_foreign_message_sent() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let tx_hash = B256::repeat_byte(0x05);
    let mut receipt = burn_receipt(registry.get("base").unwrap(), 0, 7, [0x0b; 32], 10, tx_hash);
    receipt.logs[0].address = Address::repeat_byte(0xee);
    chains.receipts.lock().unwrap().insert(tx_hash, receipt);

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete)));
    let err = relay.redeem(&request("base", "ethereum", tx_hash)).await.unwrap_err();
    assert!(matches!(err, RelayError::MessageNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_redeem_when_ready_polls() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let tx_hash = B256::repeat_byte(0x06);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("arbitrum").unwrap(), 6, 11, [0x0b; 32], 10, tx_hash),
    );

    let iris = Arc::new(FakeIris::new(3, AttestationStatus::Complete));
    let relay = relay(chains, iris.clone()).with_poller(AttestationPoller::new(PollConfig {
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(4),
        backoff_multiplier: 2.0,
        deadline: Duration::from_secs(60),
    }));

    let tx = relay
        .redeem_when_ready(&request("arbitrum", "base", tx_hash), std::future::pending())
        .await
        .unwrap();
    assert!(matches!(tx, Some(RedemptionTransaction::Evm(_))));
    assert_eq!(iris.queries.load(Ordering::SeqCst), 4);
}

// ============================================================================
// REDEEM (SOLANA)
// ============================================================================

#[tokio::test]
async fn test_solana_redeem_goes_through_lookup_table() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let owner = Pubkey::new_unique();
    let payer = Pubkey::new_unique();
    let ata = associated_token_address(&owner, &relay_core::registry::SOLANA_USDC_MINT);
    let tx_hash = B256::repeat_byte(0x07);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("ethereum").unwrap(), 5, 9_000, ata.to_bytes(), 2_000_000, tx_hash),
    );

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete))).with_options(RelayOptions {
        fee_payer: Some(payer),
        relayer_fee: Some(50_000),
        size_limits: SizeLimits {
            max_transaction_bytes: 1232,
            max_static_accounts: 16,
        },
        verify_nonce_pda_onchain: false,
    });

    let mut req = request("ethereum", "solana", tx_hash);
    req.recipient_owner = Some(owner.to_string());
    let Some(RedemptionTransaction::Solana(redemption)) = relay.redeem(&req).await.unwrap() else {
        panic!("expected Solana redemption");
    };

    // ATA creation, receive_message, relayer fee transfer
    assert_eq!(redemption.instructions.len(), 3);
    let SubmitPlan::LookupTable(mut flow) = redemption.plan else {
        panic!("oversized redeem must use a lookup table");
    };

    // Never a single oversized transaction: the table comes first
    let FlowAction::Submit(create) = flow.next_action(1_000).unwrap() else {
        panic!("expected table creation");
    };
    assert_eq!(create.len(), 1);
    assert!(flow.compile(Hash::default()).is_err());
    flow.confirm(Confirmation { slot: 1_001, finalized: true }).unwrap();

    let mut slot = 1_001;
    while let LookupTablePhase::TableCreated { .. } = flow.phase {
        let FlowAction::Submit(extend) = flow.next_action(slot).unwrap() else {
            panic!("expected table extension");
        };
        assert_eq!(extend.len(), 1);
        slot += 1;
        flow.confirm(Confirmation { slot, finalized: true }).unwrap();
    }

    assert!(matches!(flow.phase, LookupTablePhase::TableExtended { .. }));
    assert!(flow.next_action(slot).is_err());
    assert_eq!(flow.next_action(slot + 1).unwrap(), FlowAction::Ready);
    assert!(flow.compile(Hash::default()).is_ok());
}

#[tokio::test]
async fn test_solana_redeem_fits_in_one_transaction_without_extras() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let owner = Pubkey::new_unique();
    let ata = associated_token_address(&owner, &relay_core::registry::SOLANA_USDC_MINT);
    chains.existing_accounts.lock().unwrap().push(ata.to_bytes());
    let tx_hash = B256::repeat_byte(0x08);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("ethereum").unwrap(), 5, 12, ata.to_bytes(), 5, tx_hash),
    );

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete))).with_options(RelayOptions {
        fee_payer: Some(Pubkey::new_unique()),
        ..RelayOptions::default()
    });

    let Some(RedemptionTransaction::Solana(redemption)) =
        relay.redeem(&request("ethereum", "solana", tx_hash)).await.unwrap()
    else {
        panic!("expected Solana redemption");
    };
    assert_eq!(redemption.instructions.len(), 1);
    assert!(!redemption.requires_lookup_table());
}

#[tokio::test]
async fn test_solana_redeem_without_fee_payer_fails() {
    let chains = Arc::new(FakeChains::default());
    let registry = ChainRegistry::mainnet();
    let tx_hash = B256::repeat_byte(0x09);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("ethereum").unwrap(), 5, 12, [0x0b; 32], 5, tx_hash),
    );
    chains.existing_accounts.lock().unwrap().push([0x0b; 32]);

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete)));
    let err = relay.redeem(&request("ethereum", "solana", tx_hash)).await.unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));
}

/// Burn to a Solana wallet whose token account already exists
fn solana_redeem_setup(chains: &FakeChains, nonce: u64, tx_byte: u8) -> B256 {
    let registry = ChainRegistry::mainnet();
    let owner = Pubkey::new_unique();
    let ata = associated_token_address(&owner, &relay_core::registry::SOLANA_USDC_MINT);
    chains.existing_accounts.lock().unwrap().push(ata.to_bytes());
    let tx_hash = B256::repeat_byte(tx_byte);
    chains.receipts.lock().unwrap().insert(
        tx_hash,
        burn_receipt(registry.get("ethereum").unwrap(), 5, nonce, ata.to_bytes(), 5, tx_hash),
    );
    tx_hash
}

fn used_nonces_account(source_domain: u32, nonce: u64) -> Pubkey {
    Pda::find(
        used_nonces_seeds(source_domain, nonce).unwrap(),
        &relay_core::registry::SOLANA_MESSAGE_TRANSMITTER_PROGRAM,
    )
    .unwrap()
    .address
}

fn onchain_check_relay(chains: Arc<FakeChains>) -> Relay {
    relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete))).with_options(RelayOptions {
        fee_payer: Some(Pubkey::new_unique()),
        verify_nonce_pda_onchain: true,
        ..RelayOptions::default()
    })
}

#[tokio::test]
async fn test_solana_redeem_accepts_matching_onchain_nonce_account() {
    init_tracing();
    let chains = Arc::new(FakeChains::default());
    let tx_hash = solana_redeem_setup(&chains, 12, 0x0a);
    *chains.used_nonces_view.lock().unwrap() = Some(used_nonces_account(0, 12).to_bytes());

    let relay = onchain_check_relay(chains);
    let tx = relay.redeem(&request("ethereum", "solana", tx_hash)).await.unwrap();
    assert!(matches!(tx, Some(RedemptionTransaction::Solana(_))));
}

#[tokio::test]
async fn test_solana_redeem_rejects_mismatched_onchain_nonce_account() {
    init_tracing();
    let chains = Arc::new(FakeChains::default());
    let tx_hash = solana_redeem_setup(&chains, 12, 0x0b);
    // Valid PDA, but for the next 6400-nonce bucket
    *chains.used_nonces_view.lock().unwrap() = Some(used_nonces_account(0, 6_412).to_bytes());

    let relay = onchain_check_relay(chains);
    let err = relay.redeem(&request("ethereum", "solana", tx_hash)).await.unwrap_err();
    assert!(matches!(err, RelayError::DerivationFailure(_)), "got {:?}", err);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_solana_redeem_skips_onchain_check_when_disabled() {
    init_tracing();
    let chains = Arc::new(FakeChains::default());
    let tx_hash = solana_redeem_setup(&chains, 12, 0x0c);
    *chains.used_nonces_view.lock().unwrap() = Some(used_nonces_account(0, 6_412).to_bytes());

    let relay = relay(chains, Arc::new(FakeIris::new(0, AttestationStatus::Complete))).with_options(RelayOptions {
        fee_payer: Some(Pubkey::new_unique()),
        ..RelayOptions::default()
    });
    assert!(relay.redeem(&request("ethereum", "solana", tx_hash)).await.unwrap().is_some());
}
