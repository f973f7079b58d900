//! `targets` command implementation.

use anyhow::Result;
use console::style;
use ocdflash::{TARGETS, Target, target};

use crate::CliError;

/// Render the target list as aligned plain-text rows.
pub(crate) fn format_targets(targets: &[Target]) -> Vec<String> {
    let width = targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
    targets
        .iter()
        .map(|t| format!("{:<width$}  {}", t.name, t.description))
        .collect()
}

/// Look up a registered target by name.
pub(crate) fn lookup_target(name: &str) -> Result<&'static Target> {
    target::find(name).ok_or_else(|| {
        let known: Vec<&str> = TARGETS.iter().map(|t| t.name).collect();
        CliError::Usage(format!(
            "Unknown target `{name}` (available: {})",
            known.join(", ")
        ))
        .into()
    })
}

/// Show one target, or list all registered targets, on stdout.
pub(crate) fn cmd_targets(name: Option<&str>, json: bool) -> Result<()> {
    if let Some(name) = name {
        let target = lookup_target(name)?;
        if json {
            println!("{}", serde_json::to_string_pretty(target)?);
        } else {
            println!("{}", target.name);
            println!("  {}", style(target.title).bold());
            println!("  {}", target.description);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(TARGETS)?);
        return Ok(());
    }

    for (target, row) in TARGETS.iter().zip(format_targets(TARGETS)) {
        println!("{row}");
        log::debug!("{} => {}", target.name, target.title);
    }
    eprintln!(
        "\n{} Run a target with {}",
        style("ℹ").blue(),
        style("ocdflash <target>").cyan()
    );
    Ok(())
}
