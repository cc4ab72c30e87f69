//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use habitsync_core::{Habit, Note, PushOutcome, SnapshotOutcome, SyncReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single habit with its recent history
    pub fn print_habit(&self, habit: &Habit) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:     {}", habit.id);
                println!("Name:   {}", habit.name);
                println!("Streak: {} day(s)", habit.streak);
                println!("Week:   {}", recent_days(habit, 7));
            }
            OutputFormat::Json => print_json(habit),
            OutputFormat::Quiet => println!("{}", habit.id),
        }
    }

    /// Print a list of habits
    pub fn print_habits(&self, habits: &[Habit]) {
        match self.format {
            OutputFormat::Human => {
                if habits.is_empty() {
                    println!("No habits yet.");
                    return;
                }
                for habit in habits {
                    println!(
                        "{} | {:<30} | {} | streak {}",
                        habit.id,
                        truncate(&habit.name, 30),
                        recent_days(habit, 7),
                        habit.streak
                    );
                }
                println!("\n{} habit(s)", habits.len());
            }
            OutputFormat::Json => print_json(habits),
            OutputFormat::Quiet => {
                for habit in habits {
                    println!("{}", habit.id);
                }
            }
        }
    }

    /// Print a single note in full
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:    {}", note.id);
                println!("Title: {}", note.title);
                if !note.content.is_empty() {
                    println!();
                    println!("{}", note.content);
                }
            }
            OutputFormat::Json => print_json(note),
            OutputFormat::Quiet => println!("{}", note.id),
        }
    }

    /// Print a list of notes
    pub fn print_notes(&self, notes: &[Note]) {
        match self.format {
            OutputFormat::Human => {
                if notes.is_empty() {
                    println!("No notes yet.");
                    return;
                }
                for note in notes {
                    println!(
                        "{} | {} | {}",
                        note.id,
                        truncate(&note.title, 30),
                        truncate_line(&note.content, 45)
                    );
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => print_json(notes),
            OutputFormat::Quiet => {
                for note in notes {
                    println!("{}", note.id);
                }
            }
        }
    }

    /// Print what a sync cycle did
    pub fn print_sync_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                println!("Push:     {}", describe_push(report.push));
                let pull = match (&report.merged, report.pull_failed) {
                    (_, true) => "failed, will retry".to_string(),
                    (Some(m), _) if m.restored_snapshot.is_some() => {
                        format!("restored snapshot, replayed {} event(s)", m.applied)
                    }
                    (Some(m), _) => format!("merged {} event(s)", m.applied),
                    (None, _) => "up to date".to_string(),
                };
                println!("Pull:     {}", pull);
                println!("Snapshot: {}", describe_snapshot(report.snapshot));
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "push": describe_push(report.push),
                        "pulled": report.merged.as_ref().map(|m| m.applied),
                        "checkpoint": report.merged.as_ref().map(|m| m.checkpoint),
                        "restored_snapshot": report
                            .merged
                            .as_ref()
                            .and_then(|m| m.restored_snapshot),
                        "pull_failed": report.pull_failed,
                        "snapshot": describe_snapshot(report.snapshot),
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

fn describe_push(outcome: PushOutcome) -> String {
    match outcome {
        PushOutcome::Skipped => "nothing to send".to_string(),
        PushOutcome::Pushed(n) => format!("sent {} event(s)", n),
        PushOutcome::Created(n) => format!("created remote log with {} event(s)", n),
        PushOutcome::Failed => "failed, events kept for retry".to_string(),
    }
}

fn describe_snapshot(outcome: SnapshotOutcome) -> String {
    match outcome {
        SnapshotOutcome::Skipped => "skipped".to_string(),
        SnapshotOutcome::CoolingDown { next_eligible_at } => {
            format!("not due until {}", format_millis(next_eligible_at))
        }
        SnapshotOutcome::Completed { timestamp } => {
            format!("compacted at {}", format_millis(timestamp))
        }
        SnapshotOutcome::Failed => "failed, will retry".to_string(),
    }
}

/// Render epoch milliseconds as local time, or "never" for 0
pub fn format_millis(millis: i64) -> String {
    if millis <= 0 {
        return "never".to_string();
    }
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

/// Last `days` entries of the history, oldest first, as check marks
fn recent_days(habit: &Habit, days: usize) -> String {
    let start = habit.history.len().saturating_sub(days);
    habit.history[start..]
        .iter()
        .map(|checked| if *checked { '■' } else { '·' })
        .collect()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
