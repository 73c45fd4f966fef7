//! Lookup-table flow persistence between CLI invocations

use eyre::{Result, WrapErr};
use relay_core::solana::LookupTableFlow;
use std::fs;
use std::path::Path;

pub fn load_flow(path: &Path) -> Result<LookupTableFlow> {
    let raw = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read lookup-table state from {}", path.display()))?;
    serde_json::from_str(&raw)
        .wrap_err_with(|| format!("Invalid lookup-table state in {}", path.display()))
}

/// Write via a temporary sibling and rename, so a crash never leaves a
/// half-written state file.
pub fn save_flow(path: &Path, flow: &LookupTableFlow) -> Result<()> {
    let json = serde_json::to_string_pretty(flow).wrap_err("Failed to serialize lookup-table state")?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).wrap_err_with(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).wrap_err_with(|| format!("Failed to replace {}", path.display()))?;
    tracing::debug!(path = %path.display(), phase = ?flow.phase, "Saved lookup-table state");
    Ok(())
}
