//! Shell completion generation and installation.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use console::style;
use directories::BaseDirs;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Cli, CliError};

/// Generate shell completions to stdout.
pub(crate) fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Detect the user's current shell from environment.
pub(crate) fn detect_shell_type() -> Option<Shell> {
    // Try $SHELL first (Unix)
    if let Ok(shell_path) = env::var("SHELL") {
        return shell_from_path(&shell_path);
    }

    // On Windows, try PSModulePath for PowerShell detection
    if cfg!(windows) && env::var("PSModulePath").is_ok() {
        return Some(Shell::PowerShell);
    }

    None
}

/// Parse a shell binary path into its `Shell` enum.
fn shell_from_path(shell_path: &str) -> Option<Shell> {
    let shell_name = Path::new(shell_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match shell_name {
        "bash" => Some(Shell::Bash),
        "zsh" => Some(Shell::Zsh),
        "fish" => Some(Shell::Fish),
        "elvish" => Some(Shell::Elvish),
        "pwsh" | "powershell" => Some(Shell::PowerShell),
        _ => None,
    }
}

/// Get the completion script installation path for a given shell.
fn completion_install_path(shell: Shell, dirs: &BaseDirs) -> Result<PathBuf> {
    match shell {
        // ~/.local/share/bash-completion/completions/ocdflash
        Shell::Bash => Ok(dirs
            .data_dir()
            .join("bash-completion")
            .join("completions")
            .join("ocdflash")),
        // ~/.zfunc/_ocdflash (common convention)
        Shell::Zsh => Ok(dirs.home_dir().join(".zfunc").join("_ocdflash")),
        // ~/.config/fish/completions/ocdflash.fish
        Shell::Fish => Ok(dirs
            .config_dir()
            .join("fish")
            .join("completions")
            .join("ocdflash.fish")),
        Shell::Elvish => Ok(dirs
            .config_dir()
            .join("elvish")
            .join("lib")
            .join("ocdflash.elv")),
        _ => Err(CliError::Usage(format!("Unsupported shell for auto-install: {shell}")).into()),
    }
}

/// Install shell completions automatically.
pub(crate) fn cmd_completions_install(shell_arg: Option<Shell>) -> Result<()> {
    let shell = match shell_arg {
        Some(s) => s,
        None => detect_shell_type().ok_or_else(|| {
            CliError::Usage(
                "Could not detect your shell. Please specify it explicitly:\n  \
                 ocdflash completions --install bash"
                    .to_string(),
            )
        })?,
    };

    let dirs = BaseDirs::new().context("Could not determine home directory")?;
    let path = completion_install_path(shell, &dirs)?;

    // Generate the completion script to a buffer
    let mut buf = Vec::new();
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut buf);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, &buf)
        .with_context(|| format!("Failed to write completion file: {}", path.display()))?;

    eprintln!(
        "{} Installed {} completions to {}",
        style("✓").green().bold(),
        style(shell).cyan(),
        style(path.display()).yellow()
    );
    if shell == Shell::Zsh {
        eprintln!(
            "Make sure {} is in your ~/.zshrc",
            style("fpath=(~/.zfunc $fpath)").cyan()
        );
    }

    Ok(())
}
