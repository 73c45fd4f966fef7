//! Attestation service client
//!
//! One HTTP GET per call, no internal retry. Every response is mapped onto
//! [`AttestationStatus`]; transport failures and unexpected shapes become
//! `Error` rather than propagating, so the caller can decide whether to poll
//! again.
//!
//! ## Endpoints
//!
//! ```text
//! GET {base}/attestations/{messageHash}  -> {attestation, status}
//! GET {base}/messages/{domain}/{txHash}  -> {messages: [{message, attestation, status?}]}
//! ```

use alloy::primitives::B256;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};
use crate::hash::keccak256;

/// Production attestation service
pub const IRIS_MAINNET_URL: &str = "https://iris-api.circle.com";

/// Sandbox (testnet) attestation service
pub const IRIS_SANDBOX_URL: &str = "https://iris-api-sandbox.circle.com";

/// Literal the service uses while signatures are being collected
const PENDING_MARKER: &str = "PENDING";

/// Status reported before the burn reaches the required block confirmations
const PENDING_CONFIRMATIONS: &str = "pending_confirmations";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationEnvironment {
    Mainnet,
    Sandbox,
}

impl AttestationEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            AttestationEnvironment::Mainnet => IRIS_MAINNET_URL,
            AttestationEnvironment::Sandbox => IRIS_SANDBOX_URL,
        }
    }
}

impl std::str::FromStr for AttestationEnvironment {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "production" => Ok(AttestationEnvironment::Mainnet),
            "sandbox" | "testnet" => Ok(AttestationEnvironment::Sandbox),
            other => Err(RelayError::Config(format!(
                "unknown attestation environment: {}",
                other
            ))),
        }
    }
}

/// How to address the attestation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationQuery {
    ByMessageHash([u8; 32]),
    ByTransaction { source_domain: u32, tx_hash: B256 },
}

impl fmt::Display for AttestationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttestationQuery::ByMessageHash(hash) => write!(f, "message 0x{}", hex::encode(hash)),
            AttestationQuery::ByTransaction {
                source_domain,
                tx_hash,
            } => write!(f, "tx {} on domain {}", tx_hash, source_domain),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationStatus {
    Pending,
    Complete,
    Error,
}

impl fmt::Display for AttestationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttestationStatus::Pending => write!(f, "pending"),
            AttestationStatus::Complete => write!(f, "complete"),
            AttestationStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of one attestation query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// keccak256 of the message, when known
    pub message_hash: Option<[u8; 32]>,
    pub status: AttestationStatus,
    /// Concatenated attester signatures, present only when complete
    pub signature: Option<Vec<u8>>,
    /// Raw message bytes, when the service returned them
    pub message: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl Attestation {
    pub fn pending(message_hash: Option<[u8; 32]>) -> Self {
        Self {
            message_hash,
            status: AttestationStatus::Pending,
            signature: None,
            message: None,
            error: None,
        }
    }

    pub fn error(message_hash: Option<[u8; 32]>, error: impl Into<String>) -> Self {
        Self {
            message_hash,
            status: AttestationStatus::Error,
            signature: None,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == AttestationStatus::Complete && self.signature.is_some()
    }

    /// The signature, or `AttestationIncomplete`
    pub fn require_signature(&self) -> Result<&[u8]> {
        match (&self.status, &self.signature) {
            (AttestationStatus::Complete, Some(sig)) => Ok(sig),
            _ => Err(RelayError::AttestationIncomplete),
        }
    }
}

// ============================================================================
// Response schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    attestation: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<MessageEntry>,
}

#[derive(Debug, Deserialize)]
struct MessageEntry {
    message: String,
    attestation: String,
    #[serde(default)]
    status: Option<String>,
}

fn is_pending_marker(value: &str) -> bool {
    value == PENDING_MARKER || value == PENDING_CONFIRMATIONS
}

fn decode_hex_field(field: &str, value: &str) -> std::result::Result<Vec<u8>, String> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|e| format!("{} is not hex: {}", field, e))
}

/// Classify a `/attestations/{hash}` body
fn classify_attestation_body(message_hash: [u8; 32], body: &serde_json::Value) -> Attestation {
    if let Ok(err) = serde_json::from_value::<ErrorResponse>(body.clone()) {
        return Attestation::error(Some(message_hash), err.error);
    }

    let parsed: AttestationResponse = match serde_json::from_value(body.clone()) {
        Ok(parsed) => parsed,
        Err(e) => return Attestation::error(Some(message_hash), format!("unexpected response: {}", e)),
    };

    if is_pending_marker(&parsed.status) {
        return Attestation::pending(Some(message_hash));
    }
    let Some(attestation) = parsed.attestation.as_deref() else {
        return Attestation::error(Some(message_hash), "attestation field missing");
    };
    if is_pending_marker(attestation) {
        return Attestation::pending(Some(message_hash));
    }

    match decode_hex_field("attestation", attestation) {
        Ok(signature) => Attestation {
            message_hash: Some(message_hash),
            status: AttestationStatus::Complete,
            signature: Some(signature),
            message: None,
            error: None,
        },
        Err(e) => Attestation::error(Some(message_hash), e),
    }
}

/// Classify a `/messages/{domain}/{tx}` body; the first message is used
fn classify_messages_body(body: &serde_json::Value) -> Attestation {
    if let Ok(err) = serde_json::from_value::<ErrorResponse>(body.clone()) {
        return Attestation::error(None, err.error);
    }

    let parsed: MessagesResponse = match serde_json::from_value(body.clone()) {
        Ok(parsed) => parsed,
        Err(e) => return Attestation::error(None, format!("unexpected response: {}", e)),
    };

    let Some(entry) = parsed.messages.into_iter().next() else {
        return Attestation::pending(None);
    };

    let message = match decode_hex_field("message", &entry.message) {
        Ok(message) => message,
        Err(e) => return Attestation::error(None, e),
    };
    let message_hash = Some(keccak256(&message));

    let status_pending = entry.status.as_deref().map_or(false, is_pending_marker);
    if status_pending || is_pending_marker(&entry.attestation) {
        let mut pending = Attestation::pending(message_hash);
        pending.message = Some(message);
        return pending;
    }

    match decode_hex_field("attestation", &entry.attestation) {
        Ok(signature) => Attestation {
            message_hash,
            status: AttestationStatus::Complete,
            signature: Some(signature),
            message: Some(message),
            error: None,
        },
        Err(e) => Attestation::error(message_hash, e),
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Source of attestations
#[async_trait]
pub trait AttestationProvider: Send + Sync {
    /// Query once and classify; never sleeps
    async fn get_attestation(&self, query: &AttestationQuery) -> Attestation;
}

/// HTTP client for Circle's Iris attestation service
#[derive(Debug, Clone)]
pub struct IrisClient {
    http: reqwest::Client,
    base_url: String,
}

impl IrisClient {
    /// Client against an explicit base URL (no trailing slash required)
    pub fn new(base_url: &str) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| RelayError::Config(format!("invalid attestation URL {}: {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn for_environment(env: AttestationEnvironment) -> Result<Self> {
        Self::new(env.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, query: &AttestationQuery) -> String {
        match query {
            AttestationQuery::ByMessageHash(hash) => {
                format!("{}/attestations/0x{}", self.base_url, hex::encode(hash))
            }
            AttestationQuery::ByTransaction {
                source_domain,
                tx_hash,
            } => format!("{}/messages/{}/{}", self.base_url, source_domain, tx_hash),
        }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<Option<serde_json::Value>, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        // The service answers 404 until it has observed the burn
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map(Some)
            .map_err(|e| format!("invalid JSON: {}", e))
    }
}

#[async_trait]
impl AttestationProvider for IrisClient {
    async fn get_attestation(&self, query: &AttestationQuery) -> Attestation {
        let url = self.url_for(query);
        let known_hash = match query {
            AttestationQuery::ByMessageHash(hash) => Some(*hash),
            AttestationQuery::ByTransaction { .. } => None,
        };

        let body = match self.fetch(&url).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!(query = %query, "Attestation service has not seen the message yet");
                return Attestation::pending(known_hash);
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Attestation request failed");
                return Attestation::error(known_hash, e);
            }
        };

        let attestation = match (query, known_hash) {
            (AttestationQuery::ByMessageHash(_), Some(hash)) => classify_attestation_body(hash, &body),
            _ => classify_messages_body(&body),
        };

        debug!(query = %query, status = %attestation.status, "Attestation queried");
        attestation
    }
}
