//! Chain Registry
//!
//! Immutable table of the chains the relay can route between: protocol
//! domain, deployed contract/program addresses, token address and RPC
//! endpoint. The registry is built once at startup (mainnet defaults plus
//! RPC overrides) and shared read-only afterwards.
//!
//! # Mainnet domains
//!
//! ```text
//! ethereum=0  avalanche=1  op=2  arbitrum=3  solana=5  base=6  polygon=7
//! ```

use alloy::primitives::{address, Address};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fmt;

use crate::error::{RelayError, Result};

// ============================================================================
// Solana Program Ids
// ============================================================================

/// CCTP MessageTransmitter program
pub const SOLANA_MESSAGE_TRANSMITTER_PROGRAM: Pubkey =
    solana_sdk::pubkey!("CCTPmbSD7gX1bxKPAmg77w8oFzNFpaQiQUWD43TKaecd");

/// CCTP TokenMessengerMinter program
pub const SOLANA_TOKEN_MESSENGER_MINTER_PROGRAM: Pubkey =
    solana_sdk::pubkey!("CCTPiPYPc6AsJuwueEnWgSgucamXDZwBd53dQ11YiKX3");

/// Native USDC mint on Solana mainnet
pub const SOLANA_USDC_MINT: Pubkey = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// Default public Solana mainnet RPC
pub const SOLANA_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";

// ============================================================================
// URL Validation
// ============================================================================

/// Validates that a URL uses http/https and has a host component.
pub fn validate_rpc_url(url_str: &str, name: &str) -> Result<()> {
    let parsed = url::Url::parse(url_str)
        .map_err(|e| RelayError::Config(format!("{} must be a valid URL: {}", name, e)))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(RelayError::Config(format!(
            "{} must use http:// or https:// scheme, got {}",
            name, scheme
        )));
    }

    if parsed.host_str().is_none() {
        return Err(RelayError::Config(format!(
            "{} must have a host component",
            name
        )));
    }

    if scheme == "http" {
        tracing::warn!("{} uses unencrypted http://, use https:// in production", name);
    }

    Ok(())
}

// ============================================================================
// Chain Descriptor
// ============================================================================

/// Deployed CCTP contracts for one chain, by execution model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainContracts {
    /// Account-model chain: fixed contract addresses
    Evm {
        token_messenger: Address,
        message_transmitter: Address,
        token_minter: Address,
        usdc: Address,
    },
    /// Resource-model chain: program ids, state lives in PDAs
    Solana {
        message_transmitter_program: Pubkey,
        token_messenger_minter_program: Pubkey,
        usdc_mint: Pubkey,
    },
}

/// One routable chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDescriptor {
    /// Lower-case registry key (e.g. "base")
    pub name: String,
    /// CCTP protocol domain
    pub domain: u32,
    /// JSON-RPC endpoint; empty means "must be configured"
    pub rpc_url: String,
    pub contracts: ChainContracts,
}

impl ChainDescriptor {
    pub fn is_evm(&self) -> bool {
        matches!(self.contracts, ChainContracts::Evm { .. })
    }

    pub fn is_solana(&self) -> bool {
        matches!(self.contracts, ChainContracts::Solana { .. })
    }

    /// The burn token as 32 bytes, as it appears in BurnMessage.burnToken
    pub fn token_bytes32(&self) -> [u8; 32] {
        match &self.contracts {
            ChainContracts::Evm { usdc, .. } => crate::address_codec::evm_address_to_bytes32(usdc),
            ChainContracts::Solana { usdc_mint, .. } => usdc_mint.to_bytes(),
        }
    }

    /// RPC URL, failing if none has been configured for this chain
    pub fn require_rpc_url(&self) -> Result<&str> {
        if self.rpc_url.is_empty() {
            return Err(RelayError::Config(format!(
                "no RPC URL configured for {} (set RPC_URL_{})",
                self.name,
                self.name.to_uppercase()
            )));
        }
        Ok(&self.rpc_url)
    }
}

impl fmt::Display for ChainDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (domain {})", self.name, self.domain)
    }
}

fn evm(
    name: &str,
    domain: u32,
    rpc_url: &str,
    token_messenger: Address,
    message_transmitter: Address,
    token_minter: Address,
    usdc: Address,
) -> ChainDescriptor {
    ChainDescriptor {
        name: name.to_string(),
        domain,
        rpc_url: rpc_url.to_string(),
        contracts: ChainContracts::Evm {
            token_messenger,
            message_transmitter,
            token_minter,
            usdc,
        },
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable chain table indexed by name and by domain
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
    name_index: HashMap<String, usize>,
    domain_index: HashMap<u32, usize>,
}

impl ChainRegistry {
    /// Build a registry, rejecting duplicate names or domains
    pub fn new(chains: Vec<ChainDescriptor>) -> Result<Self> {
        let mut name_index = HashMap::new();
        let mut domain_index = HashMap::new();

        for (idx, chain) in chains.iter().enumerate() {
            let key = chain.name.to_lowercase();
            if name_index.insert(key, idx).is_some() {
                return Err(RelayError::Config(format!(
                    "duplicate chain name: {}",
                    chain.name
                )));
            }
            if domain_index.insert(chain.domain, idx).is_some() {
                return Err(RelayError::Config(format!(
                    "duplicate domain {} ({})",
                    chain.domain, chain.name
                )));
            }
            if let ChainContracts::Solana {
                message_transmitter_program,
                token_messenger_minter_program,
                usdc_mint,
            } = &chain.contracts
            {
                for (role, key) in [
                    ("message transmitter program", message_transmitter_program),
                    ("token messenger minter program", token_messenger_minter_program),
                    ("usdc mint", usdc_mint),
                ] {
                    if *key == Pubkey::default() {
                        return Err(RelayError::Config(format!(
                            "{}: {} is the default public key",
                            chain.name, role
                        )));
                    }
                }
            }
            if !chain.rpc_url.is_empty() {
                validate_rpc_url(&chain.rpc_url, &format!("RPC_URL_{}", chain.name.to_uppercase()))?;
            }
        }

        Ok(Self {
            chains,
            name_index,
            domain_index,
        })
    }

    /// Mainnet deployments
    pub fn mainnet() -> Self {
        let chains = vec![
            evm(
                "ethereum",
                0,
                "",
                address!("bd3fa81b58ba92a82136038b25adec7066af3155"),
                address!("0a992d191deec32afe36203ad87d7d289a738f81"),
                address!("c4922d64a24675e16e1586e3e3aa56c06fabe907"),
                address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            ),
            evm(
                "avalanche",
                1,
                "",
                address!("6b25532e1060ce10cc3b0a99e5683b91bfde6982"),
                address!("8186359af5f57fbb40c6b14a588d2a59c0c29880"),
                address!("420f5035fd5dc62a167e7e7f08b604335ae272b8"),
                address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            ),
            evm(
                "op",
                2,
                "",
                address!("2B4069517957735bE00ceE0fadAE88a26365528f"),
                address!("4d41f22c5a0e5c74090899e5a8fb597a8842b3e8"),
                address!("33E76C5C31cb928dc6FE6487AB3b2C0769B1A1e3"),
                address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
            ),
            evm(
                "arbitrum",
                3,
                "",
                address!("19330d10D9Cc8751218eaf51E8885D058642E08A"),
                address!("C30362313FBBA5cf9163F0bb16a0e01f01A896ca"),
                address!("E7Ed1fa7f45D05C508232aa32649D89b73b8bA48"),
                address!("af88d065e77c8cC2239327C5EDb3A432268e5831"),
            ),
            ChainDescriptor {
                name: "solana".to_string(),
                domain: 5,
                rpc_url: SOLANA_MAINNET_RPC.to_string(),
                contracts: ChainContracts::Solana {
                    message_transmitter_program: SOLANA_MESSAGE_TRANSMITTER_PROGRAM,
                    token_messenger_minter_program: SOLANA_TOKEN_MESSENGER_MINTER_PROGRAM,
                    usdc_mint: SOLANA_USDC_MINT,
                },
            },
            evm(
                "base",
                6,
                "https://mainnet.base.org",
                address!("1682Ae6375C4E4A97e4B583BC394c861A46D8962"),
                address!("AD09780d193884d503182aD4588450C416D6F9D4"),
                address!("e45B133ddc64bE80252b0e9c75A8E74EF280eEd6"),
                address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            ),
            evm(
                "polygon",
                7,
                "https://polygon-rpc.com",
                address!("9daF8c91AEFAE50b9c0E69629D3F6Ca40cA3B3FE"),
                address!("F3be9355363857F3e001be68856A2f96b4C39Ba9"),
                address!("10f7835F827D6Cf035115E10c50A853d7FB2D2EC"),
                address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
            ),
        ];

        let mut name_index = HashMap::new();
        let mut domain_index = HashMap::new();
        for (idx, chain) in chains.iter().enumerate() {
            name_index.insert(chain.name.clone(), idx);
            domain_index.insert(chain.domain, idx);
        }

        Self {
            chains,
            name_index,
            domain_index,
        }
    }

    /// Replace the RPC endpoint of a chain. Consumes the registry so that
    /// overrides happen before it is shared.
    pub fn with_rpc_url(mut self, name: &str, rpc_url: &str) -> Result<Self> {
        let idx = *self
            .name_index
            .get(&name.to_lowercase())
            .ok_or_else(|| RelayError::UnknownChain(name.to_string()))?;
        validate_rpc_url(rpc_url, &format!("RPC_URL_{}", name.to_uppercase()))?;
        self.chains[idx].rpc_url = rpc_url.to_string();
        Ok(self)
    }

    /// Look up a chain by (case-insensitive) name
    pub fn get(&self, name: &str) -> Result<&ChainDescriptor> {
        self.name_index
            .get(&name.to_lowercase())
            .map(|&idx| &self.chains[idx])
            .ok_or_else(|| RelayError::UnknownChain(name.to_string()))
    }

    /// Look up a chain by protocol domain
    pub fn by_domain(&self, domain: u32) -> Result<&ChainDescriptor> {
        self.domain_index
            .get(&domain)
            .map(|&idx| &self.chains[idx])
            .ok_or_else(|| RelayError::UnknownChain(format!("domain {}", domain)))
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_domains() {
        let registry = ChainRegistry::mainnet();
        let expected = [
            ("ethereum", 0),
            ("avalanche", 1),
            ("op", 2),
            ("arbitrum", 3),
            ("solana", 5),
            ("base", 6),
            ("polygon", 7),
        ];
        for (name, domain) in expected {
            assert_eq!(registry.get(name).unwrap().domain, domain, "{}", name);
            assert_eq!(registry.by_domain(domain).unwrap().name, name);
        }
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ChainRegistry::mainnet();
        assert_eq!(registry.get("Base").unwrap().domain, 6);
        assert_eq!(registry.get("ETHEREUM").unwrap().domain, 0);
    }

    #[test]
    fn test_unknown_chain() {
        let registry = ChainRegistry::mainnet();
        assert!(matches!(
            registry.get("fantom"),
            Err(RelayError::UnknownChain(_))
        ));
        assert!(matches!(
            registry.by_domain(4),
            Err(RelayError::UnknownChain(_))
        ));
    }

    #[test]
    fn test_base_addresses() {
        let registry = ChainRegistry::mainnet();
        let base = registry.get("base").unwrap();
        match &base.contracts {
            ChainContracts::Evm {
                token_messenger,
                usdc,
                ..
            } => {
                assert_eq!(
                    *token_messenger,
                    address!("1682Ae6375C4E4A97e4B583BC394c861A46D8962")
                );
                assert_eq!(*usdc, address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));
            }
            other => panic!("expected EVM contracts, got {:?}", other),
        }
        assert_eq!(base.rpc_url, "https://mainnet.base.org");
    }

    #[test]
    fn test_rpc_override() {
        let registry = ChainRegistry::mainnet()
            .with_rpc_url("ethereum", "https://eth.example.org")
            .unwrap();
        assert_eq!(registry.get("ethereum").unwrap().rpc_url, "https://eth.example.org");

        assert!(ChainRegistry::mainnet()
            .with_rpc_url("ethereum", "ftp://eth.example.org")
            .is_err());
        assert!(ChainRegistry::mainnet()
            .with_rpc_url("fantom", "https://ftm.example.org")
            .is_err());
    }

    #[test]
    fn test_missing_rpc_url_is_reported() {
        let registry = ChainRegistry::mainnet();
        let err = registry.get("ethereum").unwrap().require_rpc_url().unwrap_err();
        assert!(err.to_string().contains("RPC_URL_ETHEREUM"));
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let registry = ChainRegistry::mainnet();
        let mut chains: Vec<ChainDescriptor> = registry.chains().cloned().collect();
        let mut dup = chains[0].clone();
        dup.name = "ethereum-clone".to_string();
        chains.push(dup);
        assert!(ChainRegistry::new(chains).is_err());
    }

    #[test]
    fn test_default_program_id_rejected() {
        let chains = vec![ChainDescriptor {
            name: "solana".to_string(),
            domain: 5,
            rpc_url: String::new(),
            contracts: ChainContracts::Solana {
                message_transmitter_program: Pubkey::default(),
                token_messenger_minter_program: SOLANA_TOKEN_MESSENGER_MINTER_PROGRAM,
                usdc_mint: SOLANA_USDC_MINT,
            },
        }];
        assert!(ChainRegistry::new(chains).is_err());
    }

    #[test]
    fn test_token_bytes32() {
        let registry = ChainRegistry::mainnet();
        let solana = registry.get("solana").unwrap();
        assert_eq!(solana.token_bytes32(), SOLANA_USDC_MINT.to_bytes());

        let eth = registry.get("ethereum").unwrap();
        let token = eth.token_bytes32();
        assert_eq!(&token[..12], &[0u8; 12]);
    }
}
