use eyre::{eyre, Result, WrapErr};
use relay_core::address_codec::parse_solana_pubkey;
use relay_core::attestation::{AttestationEnvironment, PollConfig};
use relay_core::registry::{validate_rpc_url, ChainRegistry};
use relay_core::solana::lookup_table::{SizeLimits, DEFAULT_MAX_STATIC_ACCOUNTS};
use relay_core::RelayOptions;
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the relayer CLI
#[derive(Clone)]
pub struct Config {
    pub attestation_url: String,
    /// `RPC_URL_<CHAIN>` overrides, keyed by lower-case chain name
    pub rpc_urls: BTreeMap<String, String>,
    pub solana_fee_payer: Option<Pubkey>,
    pub relayer_fee: Option<u64>,
    pub max_static_accounts: usize,
    pub verify_nonce_pda_onchain: bool,
    pub poll: PollSettings,
}

/// Attestation polling schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub deadline_secs: u64,
}

/// RPC URLs often carry provider API keys; only the chain names are shown.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("attestation_url", &self.attestation_url)
            .field("rpc_urls", &self.rpc_urls.keys().collect::<Vec<_>>())
            .field("solana_fee_payer", &self.solana_fee_payer)
            .field("relayer_fee", &self.relayer_fee)
            .field("max_static_accounts", &self.max_static_accounts)
            .field("verify_nonce_pda_onchain", &self.verify_nonce_pda_onchain)
            .field("poll", &self.poll)
            .finish()
    }
}

/// Default functions
fn default_initial_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_deadline_secs() -> u64 {
    20 * 60
}

fn parse_var<T: FromStr>(vars: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match vars(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| eyre!("{} is invalid: {}", key, e)),
        _ => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from a variable lookup (the process environment in production)
    pub fn from_vars(vars: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let environment = match vars("ATTESTATION_ENV") {
            Some(raw) => AttestationEnvironment::from_str(&raw).wrap_err("ATTESTATION_ENV")?,
            None => AttestationEnvironment::Mainnet,
        };
        let attestation_url = vars("ATTESTATION_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| environment.base_url().to_string());

        let mut rpc_urls = BTreeMap::new();
        for chain in ChainRegistry::mainnet().chains() {
            let key = format!("RPC_URL_{}", chain.name.to_uppercase());
            if let Some(url) = vars(&key).filter(|url| !url.trim().is_empty()) {
                rpc_urls.insert(chain.name.clone(), url.trim().to_string());
            }
        }

        let solana_fee_payer = match vars("SOLANA_FEE_PAYER").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(parse_solana_pubkey(raw.trim()).wrap_err("SOLANA_FEE_PAYER")?),
            None => None,
        };

        let config = Config {
            attestation_url,
            rpc_urls,
            solana_fee_payer,
            relayer_fee: parse_var(&vars, "RELAYER_FEE_AMOUNT")?,
            max_static_accounts: parse_var(&vars, "SOLANA_MAX_STATIC_ACCOUNTS")?
                .unwrap_or(DEFAULT_MAX_STATIC_ACCOUNTS),
            verify_nonce_pda_onchain: parse_var(&vars, "VERIFY_NONCE_PDA_ONCHAIN")?.unwrap_or(false),
            poll: PollSettings {
                initial_backoff_ms: parse_var(&vars, "POLL_INITIAL_BACKOFF_MS")?
                    .unwrap_or(default_initial_backoff_ms()),
                max_backoff_ms: parse_var(&vars, "POLL_MAX_BACKOFF_MS")?
                    .unwrap_or(default_max_backoff_ms()),
                deadline_secs: parse_var(&vars, "POLL_DEADLINE_SECS")?
                    .unwrap_or(default_deadline_secs()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validate_rpc_url(&self.attestation_url, "ATTESTATION_URL")?;

        for (chain, url) in &self.rpc_urls {
            validate_rpc_url(url, &format!("RPC_URL_{}", chain.to_uppercase()))?;
        }

        if self.max_static_accounts == 0 || self.max_static_accounts > 256 {
            return Err(eyre!("SOLANA_MAX_STATIC_ACCOUNTS must be between 1 and 256"));
        }

        if self.relayer_fee == Some(0) {
            return Err(eyre!("RELAYER_FEE_AMOUNT must be greater than zero when set"));
        }
        if self.relayer_fee.is_some() && self.solana_fee_payer.is_none() {
            return Err(eyre!("RELAYER_FEE_AMOUNT requires SOLANA_FEE_PAYER"));
        }

        if self.poll.initial_backoff_ms == 0 {
            return Err(eyre!("POLL_INITIAL_BACKOFF_MS must be greater than zero"));
        }
        if self.poll.initial_backoff_ms > self.poll.max_backoff_ms {
            return Err(eyre!("POLL_INITIAL_BACKOFF_MS cannot exceed POLL_MAX_BACKOFF_MS"));
        }
        if self.poll.deadline_secs == 0 {
            return Err(eyre!("POLL_DEADLINE_SECS must be greater than zero"));
        }

        Ok(())
    }

    /// Mainnet registry with the configured RPC overrides applied
    pub fn registry(&self) -> Result<ChainRegistry> {
        let mut registry = ChainRegistry::mainnet();
        for (chain, url) in &self.rpc_urls {
            registry = registry.with_rpc_url(chain, url)?;
        }
        Ok(registry)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            initial_backoff: Duration::from_millis(self.poll.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.poll.max_backoff_ms),
            deadline: Duration::from_secs(self.poll.deadline_secs),
            ..PollConfig::default()
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            fee_payer: self.solana_fee_payer,
            relayer_fee: self.relayer_fee,
            size_limits: SizeLimits {
                max_static_accounts: self.max_static_accounts,
                ..SizeLimits::default()
            },
            verify_nonce_pda_onchain: self.verify_nonce_pda_onchain,
        }
    }
}
