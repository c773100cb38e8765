pub mod config;
pub mod drone;
pub mod init;
pub mod operator;

use crate::output::print_json;
use anyhow::Context;
use dalsys_core::config::Config;
use dalsys_core::persistence::Persistence;
use dalsys_core::{Committer, LicenseClass, PendingAction};
use serde::Serialize;
use std::path::Path;

/// Load the project config and open its storage backend.
pub fn open(root: &Path) -> anyhow::Result<Box<dyn Persistence>> {
    let config = Config::load(root).context("failed to load config")?;
    config
        .open_persistence(root)
        .context("failed to open database")
}

/// clap value parser for `--class` / `--license`.
pub fn parse_class(s: &str) -> Result<LicenseClass, String> {
    s.parse::<LicenseClass>().map_err(|e| e.to_string())
}

/// Commit `action` if it is valid; otherwise report its messages and fail
/// without touching the store.
pub fn commit_valid<T, S>(action: &mut PendingAction<T>, store: &mut S, json: bool) -> anyhow::Result<T>
where
    T: Serialize,
    S: Committer<T>,
{
    if !action.is_valid() {
        if json {
            print_json(&serde_json::json!({
                "valid": false,
                "op": action.op().as_str(),
                "messages": action.messages(),
            }))?;
        } else {
            for message in action.messages() {
                eprintln!("!! {message} !!");
            }
        }
        anyhow::bail!(
            "{} rejected: {} validation message(s)",
            action.op().as_str(),
            action.messages().len()
        );
    }
    Ok(action.commit(store)?)
}
