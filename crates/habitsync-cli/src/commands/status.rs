//! Status command handler

use anyhow::Result;

use habitsync_core::Store;

use crate::output::{format_millis, Output, OutputFormat};

/// Show status information
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();
    let device_id = store.device_id();
    let pending = store.event_log().pending_count();
    let sync_state = store.sync_state();
    let checkpoint = sync_state.checkpoint();
    let last_snapshot = sync_state.last_snapshot();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "device_id": device_id,
                    "sync_enabled": config.sync_enabled,
                    "account_id": config.account_id,
                    "remote_dir": config.remote_dir,
                    "pending_events": pending,
                    "last_sync_time": checkpoint,
                    "last_snapshot": last_snapshot,
                    "counts": {
                        "habits": store.habits().len(),
                        "notes": store.notes().len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", pending);
        }
        OutputFormat::Human => {
            println!("HabitSync Status");
            println!("================");
            println!();
            println!("Device: {}", device_id);
            println!();
            println!("Sync:");
            println!(
                "  Status:        {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(ref account) = config.account_id {
                println!("  Account:       {}", account);
            }
            if let Some(ref dir) = config.remote_dir {
                println!("  Remote:        {}", dir.display());
            }
            println!("  Pending:       {} event(s)", pending);
            println!("  Last pull:     {}", format_millis(checkpoint));
            println!("  Last snapshot: {}", format_millis(last_snapshot));
            println!();
            println!("Storage:");
            println!("  Location: {}", config.state_dir().display());
            println!();
            println!("Contents:");
            println!("  Habits: {}", store.habits().len());
            println!("  Notes:  {}", store.notes().len());
        }
    }

    Ok(())
}
