//! Sync command handler

use std::sync::Arc;

use anyhow::{bail, Result};

use habitsync_core::{Config, DirectoryRemote, RemoteStore, Store};

use crate::output::Output;

/// Remote store for the configured shared directory
pub fn remote_for(config: &Config) -> Option<Arc<dyn RemoteStore>> {
    config
        .remote_dir
        .as_ref()
        .map(|dir| Arc::new(DirectoryRemote::new(dir)) as Arc<dyn RemoteStore>)
}

/// Run one sync cycle and report what happened
pub async fn sync(store: &mut Store, output: &Output) -> Result<()> {
    let config = store.config();

    if !config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             habitsync config set sync_enabled true"
        );
    }

    let Some(account) = config.sync_account().map(str::to_owned) else {
        bail!(
            "Account not configured. Set it with:\n  \
             habitsync config set account_id <account>"
        );
    };

    let Some(remote) = remote_for(config) else {
        bail!(
            "Remote directory not configured. Set it with:\n  \
             habitsync config set remote_dir /path/to/shared/folder"
        );
    };

    output.message(&format!("Syncing account {}...", account));

    let engine = store.engine(remote);
    let report = store.sync(&engine).await?;
    output.print_sync_report(&report);

    if report.has_failures() {
        bail!("Sync incomplete. Local changes are kept and will be retried on the next sync.");
    }

    output.success(&format!(
        "Sync complete - {} habit(s), {} note(s)",
        store.habits().len(),
        store.notes().len()
    ));
    Ok(())
}

/// Sync quietly (for auto-sync) - no output on success
pub async fn sync_quiet(store: &mut Store) -> Result<()> {
    if store.config().sync_account().is_none() {
        return Ok(());
    }
    let Some(remote) = remote_for(store.config()) else {
        return Ok(());
    };

    let engine = store.engine(remote);
    let report = store.sync(&engine).await?;
    if report.has_failures() {
        bail!("remote store unreachable, changes kept for the next sync");
    }
    Ok(())
}
