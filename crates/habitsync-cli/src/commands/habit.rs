//! Habit command handlers

use anyhow::{Context, Result};

use habitsync_core::{EntityId, Store};

use crate::output::Output;

/// Add a new habit
pub fn add(store: &mut Store, name: String, output: &Output) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Habit name cannot be empty");
    }

    let habit = store.add_habit(&name).context("Failed to add habit")?;

    if output.is_quiet() {
        println!("{}", habit.id);
    } else {
        output.success(&format!("Added habit {} ({})", habit.name, habit.id));
    }
    Ok(())
}

/// List all habits
pub fn list(store: &Store, output: &Output) -> Result<()> {
    output.print_habits(store.habits());
    Ok(())
}

/// Check or uncheck a day, today by default
pub fn toggle(
    store: &mut Store,
    id: EntityId,
    day: Option<usize>,
    off: bool,
    output: &Output,
) -> Result<()> {
    let habit = store.toggle_habit(id, day, !off)?;
    output.print_habit(&habit);
    Ok(())
}

/// Delete a habit
pub fn delete(store: &mut Store, id: EntityId, output: &Output) -> Result<()> {
    let habit = store.delete_habit(id)?;
    output.success(&format!("Deleted habit {} ({})", habit.name, habit.id));
    Ok(())
}
