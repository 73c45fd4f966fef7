//! CCTP Relayer CLI
//!
//! - `cctp-relayer send`         -> unsigned approve/depositForBurn calls
//! - `cctp-relayer redeem`       -> unsigned redeem calls or instructions
//! - `cctp-relayer lookup-table` -> next step of a persisted lookup-table plan
//!
//! Nothing is signed or broadcast; every command prints JSON on stdout.

mod config;
mod output;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand};
use eyre::{eyre, Result};
use relay_core::solana::{FlowAction, SolanaReader};
use relay_core::{
    AttestationPoller, IrisClient, RedeemRequest, RedemptionTransaction, Relay, RelayError,
    RpcChainReaders, SubmitPlan,
};
use serde_json::json;

use config::Config;

#[derive(Parser)]
#[command(name = "cctp-relayer")]
#[command(about = "Build CCTP burn and redeem transactions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the burn calls on the source chain
    Send {
        /// EVM address that owns and burns the tokens
        sender: String,
        /// Destination recipient (EVM address, Solana wallet, or 0x bytes32)
        recipient: String,
        source: String,
        destination: String,
        /// Amount in the token's smallest unit
        amount: String,
    },

    /// Build the redeem for a burn transaction
    Redeem {
        source: String,
        destination: String,
        burn_tx_hash: String,

        /// Solana wallet owning the mint recipient token account
        #[arg(long)]
        recipient_owner: Option<String>,

        /// Poll the attestation service until the attestation is ready
        #[arg(long)]
        wait: bool,

        /// Where to store the lookup-table plan of an oversized Solana redeem
        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Advance a stored lookup-table plan
    LookupTable {
        state_file: PathBuf,

        /// Signature of the transaction carrying the previous step
        #[arg(long)]
        confirm: Option<String>,
    },
}

fn main() -> Result<ExitCode> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<ExitCode> {
    init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(report) => {
            let relay_error = report.downcast_ref::<RelayError>();
            tracing::error!(
                kind = relay_error.map_or("internal", |e| e.kind()),
                retryable = relay_error.map_or(false, |e| e.is_retryable()),
                error = %report,
                "Command failed"
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(config = ?config, "Configuration loaded");

    match cli.command {
        Commands::Send {
            sender,
            recipient,
            source,
            destination,
            amount,
        } => {
            let relay = build_relay(&config)?;
            let calls = relay
                .send(&sender, &recipient, &source, &destination, &amount)
                .await?;
            print_json(&output::render_calls(&calls))
        }
        Commands::Redeem {
            source,
            destination,
            burn_tx_hash,
            recipient_owner,
            wait,
            state_file,
        } => {
            let relay = build_relay(&config)?;
            let request = RedeemRequest {
                source_chain: source,
                destination_chain: destination,
                burn_tx_hash,
                recipient_owner,
            };

            let result = if wait {
                relay
                    .redeem_when_ready(&request, wait_for_shutdown_signal())
                    .await?
            } else {
                relay.redeem(&request).await?
            };

            let Some(tx) = result else {
                tracing::info!("Nothing to submit yet");
                return print_json(&json!({ "status": "not_ready" }));
            };
            write_lookup_table_plan(&tx, state_file.as_deref())?;
            print_json(&output::render_redemption(
                &tx,
                state_file.as_deref().and_then(|p| p.to_str()),
            ))
        }
        Commands::LookupTable { state_file, confirm } => {
            advance_lookup_table(&config, &state_file, confirm.as_deref()).await
        }
    }
}

fn build_relay(config: &Config) -> Result<Relay> {
    let registry = Arc::new(config.registry()?);
    let iris = Arc::new(IrisClient::new(&config.attestation_url)?);
    let readers = Arc::new(RpcChainReaders {
        solana_fee_payer: config.solana_fee_payer,
    });

    Ok(Relay::new(registry, iris, readers)
        .with_poller(AttestationPoller::new(config.poll_config()))
        .with_options(config.relay_options()))
}

fn write_lookup_table_plan(tx: &RedemptionTransaction, state_file: Option<&std::path::Path>) -> Result<()> {
    let RedemptionTransaction::Solana(redemption) = tx else {
        return Ok(());
    };
    let SubmitPlan::LookupTable(flow) = &redemption.plan else {
        return Ok(());
    };
    let path = state_file.ok_or_else(|| {
        eyre!("redeem exceeds a single Solana transaction; rerun with --state-file to store the lookup-table plan")
    })?;
    state::save_flow(path, flow)?;
    tracing::info!(
        path = %path.display(),
        addresses = flow.addresses.len(),
        "Stored lookup-table plan, continue with `cctp-relayer lookup-table`"
    );
    Ok(())
}

async fn advance_lookup_table(
    config: &Config,
    state_file: &std::path::Path,
    confirm: Option<&str>,
) -> Result<()> {
    let registry = config.registry()?;
    let solana = registry.get("solana")?;
    let reader = SolanaReader::new(solana, config.solana_fee_payer)?;
    let mut flow = state::load_flow(state_file)?;

    if let Some(signature) = confirm {
        let confirmation = reader
            .confirmation(signature)
            .await?
            .ok_or_else(|| eyre!("transaction {} has not landed yet", signature))?;
        flow.confirm(confirmation)?;
        state::save_flow(state_file, &flow)?;
    }

    let slot = reader.finalized_slot().await?;
    let action = flow.next_action(slot)?;
    state::save_flow(state_file, &flow)?;

    let output = match action {
        FlowAction::Submit(instructions) => json!({
            "action": "submit",
            "phase": flow.phase,
            "table": flow.table().map(|t| t.to_string()),
            "instructions": output::render_instructions(&instructions),
        }),
        FlowAction::Ready => {
            let blockhash = reader.latest_blockhash().await?;
            let message = flow.compile(blockhash)?;
            json!({
                "action": "send",
                "table": flow.table().map(|t| t.to_string()),
                "message": STANDARD.encode(message.serialize()),
            })
        }
    };
    print_json(&output)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing/logging; `LOG_FORMAT=json` switches to JSON lines
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cctp_relayer=debug,relay_core=debug"));

    let json = std::env::var("LOG_FORMAT").map_or(false, |v| v.eq_ignore_ascii_case("json"));

    // Logs go to stderr; stdout carries the command output
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

/// Resolves on SIGINT/SIGTERM; cancels `--wait` polling
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, cancelling");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_redeem_flags() {
        let cli = Cli::try_parse_from([
            "cctp-relayer",
            "redeem",
            "ethereum",
            "solana",
            "0xabc",
            "--wait",
            "--state-file",
            "/tmp/plan.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Redeem {
                wait, state_file, ..
            } => {
                assert!(wait);
                assert_eq!(state_file, Some(PathBuf::from("/tmp/plan.json")));
            }
            _ => panic!("expected redeem"),
        }
    }

    #[test]
    fn test_send_requires_amount() {
        assert!(Cli::try_parse_from(["cctp-relayer", "send", "0x1", "0x2", "base", "ethereum"]).is_err());
    }
}
