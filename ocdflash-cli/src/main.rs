//! ocdflash CLI - Upload custom firmware to STM32 boards through OpenOCD.
//!
//! ## Features
//!
//! - Reads the board, upload protocol and firmware from `platformio.ini`
//! - Resolves OpenOCD server arguments from the board manifest
//! - Uses the PlatformIO `tool-openocd` package
//! - Reports OpenOCD failures through the exit code
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

mod commands;
mod config;

use commands::completions::{cmd_completions, cmd_completions_install};
use commands::targets::cmd_targets;
use commands::upload::{UploadOptions, cmd_upload};
use config::Config;

/// ocdflash - Upload custom firmware to STM32 boards through OpenOCD.
///
/// Environment variables:
///   OCDFLASH_PROJECT_DIR   - PlatformIO project directory
///   OCDFLASH_ENV           - Project environment
///   PLATFORMIO_CORE_DIR    - PlatformIO core directory (default: ~/.platformio)
#[derive(Parser)]
#[command(name = "ocdflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// PlatformIO project directory.
    #[arg(
        short = 'd',
        long,
        global = true,
        default_value = ".",
        env = "OCDFLASH_PROJECT_DIR",
        value_name = "DIR"
    )]
    project_dir: PathBuf,

    /// Project environment (default: `default_envs` or the first environment).
    #[arg(short, long, global = true, env = "OCDFLASH_ENV")]
    environment: Option<String>,

    /// PlatformIO core directory.
    #[arg(long, global = true, env = "PLATFORMIO_CORE_DIR", value_name = "DIR")]
    core_dir: Option<PathBuf>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a custom firmware.
    #[command(name = "upload-custom-firmware", visible_alias = "upload")]
    UploadCustomFirmware {
        /// Board manifest (JSON) to use instead of searching for one.
        #[arg(long, value_name = "PATH")]
        board_file: Option<PathBuf>,

        /// Upload protocol (overrides `upload_protocol` and the board default).
        #[arg(short = 'P', long)]
        upload_protocol: Option<String>,

        /// OpenOCD installation to use instead of the PlatformIO package.
        #[arg(long, value_name = "DIR", env = "OCDFLASH_PACKAGE_DIR")]
        package_dir: Option<PathBuf>,

        /// OpenOCD debug level.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
        debug_level: Option<u8>,

        /// Print the uploader command without running it.
        #[arg(long)]
        dry_run: bool,
    },

    /// List available targets, or show one of them.
    Targets {
        /// Target to show.
        name: Option<String>,

        /// Output target list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions (auto-detected if not specified with --install).
        #[arg(value_enum)]
        shell: Option<Shell>,

        /// Automatically install completions to your shell configuration.
        #[arg(long)]
        install: bool,
    },
}

/// Errors raised by the CLI itself, classified for the exit code.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Invalid invocation.
    #[error("{0}")]
    Usage(String),

    /// Invalid or incomplete configuration.
    #[error("{0}")]
    Config(String),
}

/// Process exit codes.
mod exit_code {
    pub(crate) const FAILURE: i32 = 1;
    pub(crate) const USAGE: i32 = 2;
    pub(crate) const CONFIG: i32 = 3;
    pub(crate) const UPLOADER: i32 = 4;
}

/// Map an error to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Usage(_) => exit_code::USAGE,
            CliError::Config(_) => exit_code::CONFIG,
        };
    }
    match err.downcast_ref::<ocdflash::Error>() {
        Some(e) if e.is_uploader() => exit_code::UPLOADER,
        Some(ocdflash::Error::Io(_)) | None => exit_code::FAILURE,
        Some(_) => exit_code::CONFIG,
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(verbose >= 2)
        .format_timestamp(if verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn main() {
    let cli = Cli::parse();

    let stderr_is_tty = console::Term::stderr().is_term();
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    init_logging(cli.verbose, cli.quiet);
    debug!(
        "ocdflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code_for(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::UploadCustomFirmware {
            board_file,
            upload_protocol,
            package_dir,
            debug_level,
            dry_run,
        } => {
            let config = if let Some(ref path) = cli.config_path {
                Config::load_from_path(path)
            } else {
                Config::load(&cli.project_dir)
            };
            let opts = UploadOptions {
                board_file: board_file.clone(),
                upload_protocol: upload_protocol.clone(),
                package_dir: package_dir.clone(),
                debug_level: *debug_level,
                dry_run: *dry_run,
            };
            cmd_upload(cli, &config, &opts)
        },
        Commands::Targets { name, json } => cmd_targets(name.as_deref(), *json),
        Commands::Completions { shell, install } => {
            if *install {
                cmd_completions_install(*shell)
            } else if let Some(shell) = shell {
                cmd_completions(*shell);
                Ok(())
            } else {
                Err(CliError::Usage(
                    "specify a shell type, e.g.: ocdflash completions bash\n  \
                     Or use `ocdflash completions --install` to auto-install completions."
                        .to_string(),
                )
                .into())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_alias() {
        let cli = Cli::parse_from(["ocdflash", "upload", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Commands::UploadCustomFirmware { dry_run: true, .. }
        ));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "ocdflash",
            "upload-custom-firmware",
            "-d",
            "/work/project",
            "-e",
            "nucleo",
        ]);
        assert_eq!(cli.project_dir, Path::new("/work/project"));
        assert_eq!(cli.environment.as_deref(), Some("nucleo"));
    }

    #[test]
    fn test_debug_level_range() {
        assert!(
            Cli::try_parse_from(["ocdflash", "upload", "--debug-level", "5"]).is_err()
        );
        let cli = Cli::parse_from(["ocdflash", "upload", "--debug-level", "4"]);
        assert!(matches!(
            cli.command,
            Commands::UploadCustomFirmware {
                debug_level: Some(4),
                ..
            }
        ));
    }

    // ---- Exit codes ----

    #[test]
    fn test_exit_code_cli_errors() {
        let usage = anyhow::Error::from(CliError::Usage("x".into()));
        let config = anyhow::Error::from(CliError::Config("x".into()));
        assert_eq!(exit_code_for(&usage), 2);
        assert_eq!(exit_code_for(&config), 3);
    }

    #[test]
    fn test_exit_code_library_errors() {
        let missing = anyhow::Error::from(ocdflash::Error::NoUploadProtocol);
        assert_eq!(exit_code_for(&missing), 3);

        let uploader = anyhow::Error::from(ocdflash::Error::UploaderNotFound {
            path: PathBuf::from("openocd"),
        });
        assert_eq!(exit_code_for(&uploader), 4);

        let io = anyhow::Error::from(ocdflash::Error::Io(std::io::Error::other("x")));
        assert_eq!(exit_code_for(&io), 1);
    }

    #[test]
    fn test_exit_code_through_context() {
        use anyhow::Context;
        let err: Result<()> = Err(ocdflash::Error::NoUploadProtocol).context("while preparing");
        assert_eq!(exit_code_for(&err.unwrap_err()), 3);
    }

    #[test]
    fn test_exit_code_unknown_error() {
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 1);
    }
}
