//! Program-derived addresses for CCTP `receive_message`
//!
//! Every account the MessageTransmitter and TokenMessengerMinter programs
//! touch during a redeem is a PDA of one of the two programs:
//!
//! ```text
//! role                     program  seeds
//! message_transmitter      MT       "message_transmitter"
//! authority_pda            MT       "message_transmitter_authority", TMM id
//! mt event authority       MT       "__event_authority"
//! used_nonces              MT       "used_nonces", domain, delimiter, first nonce
//! token_messenger          TMM      "token_messenger"
//! token_minter             TMM      "token_minter"
//! local_token              TMM      "local_token", mint
//! remote_token_messenger   TMM      "remote_token_messenger", domain
//! token_pair               TMM      "token_pair", domain, remote token (32 bytes)
//! custody                  TMM      "custody", mint
//! tmm event authority      TMM      "__event_authority"
//! ```
//!
//! Domains are seeded as decimal strings.

use solana_sdk::pubkey::Pubkey;

use crate::error::{RelayError, Result};

/// SPL Token program
pub const TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// SPL Associated Token Account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Nonces tracked by one used-nonces account
pub const NONCES_PER_ACCOUNT: u64 = 6400;

/// Domains at or above this value get a "-" delimiter in used-nonces seeds
const USED_NONCES_DELIMITER_DOMAIN: u32 = 11;

/// Anchor discriminator + remote_domain + first_nonce
const USED_NONCES_HEADER_LEN: usize = 8 + 4 + 8;

// ============================================================================
// Pda
// ============================================================================

/// A derived address together with everything needed to re-check it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pda {
    pub address: Pubkey,
    pub bump: u8,
    pub program: Pubkey,
    seeds: Vec<Vec<u8>>,
}

impl Pda {
    /// `find_program_address` over owned seeds
    pub fn find(seeds: Vec<Vec<u8>>, program: &Pubkey) -> Result<Self> {
        if *program == Pubkey::default() {
            return Err(RelayError::DerivationFailure(
                "program id is the default public key".to_string(),
            ));
        }
        let refs: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();
        let (address, bump) = Pubkey::try_find_program_address(&refs, program).ok_or_else(|| {
            RelayError::DerivationFailure(format!("no viable bump for seeds under {}", program))
        })?;
        Ok(Self {
            address,
            bump,
            program: *program,
            seeds,
        })
    }

    pub fn seeds(&self) -> &[Vec<u8>] {
        &self.seeds
    }

    /// Recompute the address from seeds + bump and check it against the
    /// expected owning program.
    pub fn verify(&self, expected_program: &Pubkey) -> Result<()> {
        if self.program != *expected_program {
            return Err(RelayError::DerivationFailure(format!(
                "{} derived under {}, expected {}",
                self.address, self.program, expected_program
            )));
        }

        let bump = [self.bump];
        let mut refs: Vec<&[u8]> = self.seeds.iter().map(Vec::as_slice).collect();
        refs.push(&bump);

        let recomputed = Pubkey::create_program_address(&refs, expected_program)
            .map_err(|e| RelayError::DerivationFailure(format!("{}: {}", self.address, e)))?;
        if recomputed != self.address {
            return Err(RelayError::DerivationFailure(format!(
                "{} does not match seeds (recomputed {})",
                self.address, recomputed
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Associated token accounts
// ============================================================================

/// ATA of `owner` for `mint` under the classic token program
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

// ============================================================================
// Used nonces
// ============================================================================

/// First nonce of the 6400-nonce bucket holding `nonce` (nonces start at 1)
pub fn first_nonce(nonce: u64) -> Result<u64> {
    if nonce == 0 {
        return Err(RelayError::DerivationFailure("nonce 0 is never assigned".to_string()));
    }
    Ok(((nonce - 1) / NONCES_PER_ACCOUNT) * NONCES_PER_ACCOUNT + 1)
}

/// Seeds of the used-nonces account for (source domain, nonce)
pub fn used_nonces_seeds(source_domain: u32, nonce: u64) -> Result<Vec<Vec<u8>>> {
    let first = first_nonce(nonce)?;
    let delimiter: &[u8] = if source_domain < USED_NONCES_DELIMITER_DOMAIN {
        b""
    } else {
        b"-"
    };
    Ok(vec![
        b"used_nonces".to_vec(),
        source_domain.to_string().into_bytes(),
        delimiter.to_vec(),
        first.to_string().into_bytes(),
    ])
}

/// Whether `nonce` is marked in a used-nonces account's data
pub fn is_nonce_used(account_data: &[u8], nonce: u64) -> Result<bool> {
    let expected_len = USED_NONCES_HEADER_LEN + (NONCES_PER_ACCOUNT as usize / 64) * 8;
    if account_data.len() < expected_len {
        return Err(RelayError::Rpc(format!(
            "used-nonces account is {} bytes, expected {}",
            account_data.len(),
            expected_len
        )));
    }

    let mut first_buf = [0u8; 8];
    first_buf.copy_from_slice(&account_data[12..20]);
    let first = u64::from_le_bytes(first_buf);

    if nonce < first || nonce - first >= NONCES_PER_ACCOUNT {
        return Err(RelayError::Rpc(format!(
            "nonce {} is outside account range starting at {}",
            nonce, first
        )));
    }

    let index = (nonce - first) as usize;
    let offset = USED_NONCES_HEADER_LEN + (index / 64) * 8;
    let mut word_buf = [0u8; 8];
    word_buf.copy_from_slice(&account_data[offset..offset + 8]);
    let word = u64::from_le_bytes(word_buf);

    Ok((word >> (index % 64)) & 1 == 1)
}

// ============================================================================
// receive_message account set
// ============================================================================

/// Every PDA `receive_message` needs for one (source domain, remote token, nonce)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessagePdas {
    pub message_transmitter: Pda,
    pub authority_pda: Pda,
    pub message_transmitter_event_authority: Pda,
    pub used_nonces: Pda,
    pub token_messenger: Pda,
    pub token_minter: Pda,
    pub local_token: Pda,
    pub remote_token_messenger: Pda,
    pub token_pair: Pda,
    pub custody: Pda,
    pub token_messenger_event_authority: Pda,
}

impl ReceiveMessagePdas {
    pub fn derive(
        message_transmitter_program: &Pubkey,
        token_messenger_minter_program: &Pubkey,
        usdc_mint: &Pubkey,
        source_domain: u32,
        remote_token: &[u8; 32],
        nonce: u64,
    ) -> Result<Self> {
        let mt = message_transmitter_program;
        let tmm = token_messenger_minter_program;
        let domain = source_domain.to_string().into_bytes();

        Ok(Self {
            message_transmitter: Pda::find(vec![b"message_transmitter".to_vec()], mt)?,
            authority_pda: Pda::find(
                vec![b"message_transmitter_authority".to_vec(), tmm.to_bytes().to_vec()],
                mt,
            )?,
            message_transmitter_event_authority: Pda::find(vec![b"__event_authority".to_vec()], mt)?,
            used_nonces: Pda::find(used_nonces_seeds(source_domain, nonce)?, mt)?,
            token_messenger: Pda::find(vec![b"token_messenger".to_vec()], tmm)?,
            token_minter: Pda::find(vec![b"token_minter".to_vec()], tmm)?,
            local_token: Pda::find(vec![b"local_token".to_vec(), usdc_mint.to_bytes().to_vec()], tmm)?,
            remote_token_messenger: Pda::find(
                vec![b"remote_token_messenger".to_vec(), domain.clone()],
                tmm,
            )?,
            token_pair: Pda::find(
                vec![b"token_pair".to_vec(), domain, remote_token.to_vec()],
                tmm,
            )?,
            custody: Pda::find(vec![b"custody".to_vec(), usdc_mint.to_bytes().to_vec()], tmm)?,
            token_messenger_event_authority: Pda::find(vec![b"__event_authority".to_vec()], tmm)?,
        })
    }

    /// Re-derive every address against the registered program ids
    pub fn verify(
        &self,
        message_transmitter_program: &Pubkey,
        token_messenger_minter_program: &Pubkey,
    ) -> Result<()> {
        for pda in [
            &self.message_transmitter,
            &self.authority_pda,
            &self.message_transmitter_event_authority,
            &self.used_nonces,
        ] {
            pda.verify(message_transmitter_program)?;
        }
        for pda in [
            &self.token_messenger,
            &self.token_minter,
            &self.local_token,
            &self.remote_token_messenger,
            &self.token_pair,
            &self.custody,
            &self.token_messenger_event_authority,
        ] {
            pda.verify(token_messenger_minter_program)?;
        }
        Ok(())
    }
}
