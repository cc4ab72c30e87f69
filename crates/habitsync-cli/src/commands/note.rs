//! Note command handlers

use anyhow::{bail, Context, Result};

use habitsync_core::{EntityId, Store};

use crate::output::Output;

/// Add a new note
pub fn add(
    store: &mut Store,
    title: String,
    content: Option<String>,
    wrap: bool,
    output: &Output,
) -> Result<()> {
    if title.trim().is_empty() {
        bail!("Note title cannot be empty");
    }

    let note = store
        .add_note(title.trim(), content.as_deref().unwrap_or_default(), wrap)
        .context("Failed to add note")?;

    if output.is_quiet() {
        println!("{}", note.id);
    } else {
        output.success(&format!("Added note {} ({})", note.title, note.id));
    }
    Ok(())
}

/// List all notes, newest first
pub fn list(store: &Store, output: &Output) -> Result<()> {
    output.print_notes(store.notes());
    Ok(())
}

/// Show one note in full
pub fn show(store: &Store, id: EntityId, output: &Output) -> Result<()> {
    let note = store
        .find_note(id)
        .ok_or_else(|| anyhow::anyhow!("Note not found: {}", id))?;
    output.print_note(note);
    Ok(())
}

/// Change a note's title and/or content
pub fn edit(
    store: &mut Store,
    id: EntityId,
    title: Option<String>,
    content: Option<String>,
    output: &Output,
) -> Result<()> {
    if title.is_none() && content.is_none() {
        bail!("Nothing to change. Pass --title and/or --content.");
    }

    let note = store.update_note(id, title, content)?;
    output.success(&format!("Updated note {} ({})", note.title, note.id));
    Ok(())
}

/// Delete a note
pub fn delete(store: &mut Store, id: EntityId, output: &Output) -> Result<()> {
    let note = store.delete_note(id)?;
    output.success(&format!("Deleted note {} ({})", note.title, note.id));
    Ok(())
}
