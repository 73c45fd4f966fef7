//! Bounded attestation polling
//!
//! Re-queries an [`AttestationProvider`] with exponential backoff until the
//! attestation completes, a wall-clock deadline passes, or the caller's
//! cancellation future resolves.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::client::{Attestation, AttestationProvider, AttestationQuery, AttestationStatus};
use crate::error::{RelayError, Result};

/// Poll schedule
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay after the first unsuccessful query
    pub initial_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
    /// Total time budget measured from the first query
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            deadline: Duration::from_secs(20 * 60),
        }
    }
}

impl PollConfig {
    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.min(64) as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// Drives repeated single queries
#[derive(Debug, Clone, Default)]
pub struct AttestationPoller {
    config: PollConfig,
}

impl AttestationPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll until complete.
    ///
    /// Once the deadline passes this returns `AttestationPending` if the
    /// service still reports pending, or `AttestationTimeout` carrying the
    /// last service error. Returns `Cancelled` when `cancel` resolves first.
    pub async fn poll<P, C>(
        &self,
        provider: &P,
        query: &AttestationQuery,
        cancel: C,
    ) -> Result<Attestation>
    where
        P: AttestationProvider + ?Sized,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let started = Instant::now();
        let deadline = started + self.config.deadline;
        let mut attempt: u32 = 0;

        loop {
            let attestation = tokio::select! {
                biased;
                _ = &mut cancel => return Err(RelayError::Cancelled),
                attestation = provider.get_attestation(query) => attestation,
            };

            match attestation.status {
                AttestationStatus::Complete if attestation.signature.is_some() => {
                    info!(query = %query, attempts = attempt + 1, "Attestation complete");
                    return Ok(attestation);
                }
                AttestationStatus::Error => {
                    warn!(
                        query = %query,
                        attempt = attempt,
                        error = attestation.error.as_deref().unwrap_or("unknown"),
                        "Attestation service error, will retry"
                    );
                }
                _ => {
                    debug!(query = %query, attempt = attempt, "Attestation pending");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let key = query.to_string();
                let elapsed_secs = now.duration_since(started).as_secs();
                if attestation.status == AttestationStatus::Pending {
                    return Err(RelayError::AttestationPending { key, elapsed_secs });
                }
                return Err(RelayError::AttestationTimeout {
                    key,
                    elapsed_secs,
                    last_status: match attestation.error {
                        Some(e) => format!("{} ({})", attestation.status, e),
                        None => attestation.status.to_string(),
                    },
                });
            }

            let delay = self
                .config
                .backoff_for_attempt(attempt)
                .min(deadline.duration_since(now));
            attempt = attempt.saturating_add(1);

            tokio::select! {
                biased;
                _ = &mut cancel => return Err(RelayError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
