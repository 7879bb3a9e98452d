//! CLI output formatting

use crate::docker::{ContainerStatus, ManagedContainer};
use crate::execution::{ExecutionEvent, SkipReason};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a container status for display
pub fn format_status(status: ContainerStatus) -> String {
    let label = status.as_str().to_uppercase();
    match status {
        ContainerStatus::Created => style(label).dim().to_string(),
        ContainerStatus::Running => style(label).green().to_string(),
        ContainerStatus::Paused => style(label).blue().to_string(),
        ContainerStatus::Exited | ContainerStatus::Completed => style(label).yellow().to_string(),
        ContainerStatus::Errored => style(label).red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, procedure } => format!(
            "{} Starting test {} ({})",
            ROCKET,
            style(procedure).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StageStarted { stage, always_runs } => {
            if *always_runs {
                format!("{} Stage {} {}", INFO, style(stage).bold(), style("(always runs)").dim())
            } else {
                format!("{} Stage {}", INFO, style(stage).bold())
            }
        }
        ExecutionEvent::StageSkipped { stage, reason } => {
            let why = match reason {
                SkipReason::Filtered => "not selected",
                SkipReason::EarlierFailure => "earlier stage failed",
            };
            format!("{} Skipping {} ({})", WARN, style(stage).dim(), why)
        }
        ExecutionEvent::StepStarted { description, .. } => {
            format!("  {} {}", SPINNER, style(description).cyan())
        }
        ExecutionEvent::StepPassed { description, .. } => {
            format!("  {} {}", CHECK, style(description).green())
        }
        ExecutionEvent::StepFailed {
            description, error, ..
        } => format!("  {} {}: {}", CROSS, style(description).red(), style(error).dim()),
        ExecutionEvent::StageFinished { stage } => {
            format!("{} Stage {} finished", CHECK, style(stage).green())
        }
        ExecutionEvent::StageFailed { stage, error } => {
            format!("{} Stage {} failed: {}", CROSS, style(stage).red(), style(error).dim())
        }
        ExecutionEvent::RunFinished { run_id, passed } => {
            let run_id = run_id.to_string();
            let id = style(&run_id[..8]).dim();
            if *passed {
                format!("{} Test {} {}", CHECK, style("passed").green(), id)
            } else {
                format!("{} Test {} {}", CROSS, style("failed").red(), id)
            }
        }
    }
}

/// Format a command failure for stderr, with its causes
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", CROSS, error)
}

/// Render containers as an aligned name / id / status table
pub fn format_container_table(containers: &[ManagedContainer]) -> String {
    let name_width = containers
        .iter()
        .map(|c| c.name.len())
        .chain(std::iter::once("NAME".len()))
        .max()
        .unwrap_or(4);

    let mut lines = vec![format!(
        "{:<name_width$}  {:<12}  {}",
        "NAME",
        "ID",
        "STATUS",
        name_width = name_width
    )];
    for container in containers {
        let id: String = container.id.chars().take(12).collect();
        lines.push(format!(
            "{:<name_width$}  {:<12}  {}",
            container.name,
            id,
            format_status(container.status),
            name_width = name_width
        ));
    }
    lines.join("\n")
}
