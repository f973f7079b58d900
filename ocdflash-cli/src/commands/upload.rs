//! `upload-custom-firmware` command implementation.

use anyhow::{Context, Result};
use console::style;
use ocdflash::{
    DEFAULT_DEBUG_LEVEL, DEFAULT_PACKAGE, MAX_DEBUG_LEVEL, ProcessRunner, UploadRequest,
    default_core_dir, prepare,
};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::{Cli, CliError};

/// Options of the upload command.
#[derive(Debug, Clone, Default)]
pub(crate) struct UploadOptions {
    pub board_file: Option<PathBuf>,
    pub upload_protocol: Option<String>,
    pub package_dir: Option<PathBuf>,
    pub debug_level: Option<u8>,
    pub dry_run: bool,
}

/// Combine command line, environment and config file into an upload request.
pub(crate) fn build_request(
    cli: &Cli,
    config: &Config,
    opts: &UploadOptions,
) -> Result<UploadRequest> {
    let project_dir = cli.project_dir.clone();
    let core_dir = cli
        .core_dir
        .clone()
        .or_else(|| config.project.core_dir.clone())
        .or_else(default_core_dir)
        .ok_or_else(|| {
            CliError::Config(
                "Could not determine the PlatformIO core directory, use --core-dir".to_string(),
            )
        })?;
    let core_dir = absolute(&core_dir)?;

    let debug_level = opts
        .debug_level
        .or(config.uploader.debug_level)
        .unwrap_or(DEFAULT_DEBUG_LEVEL);
    if debug_level > MAX_DEBUG_LEVEL {
        return Err(CliError::Config(format!(
            "debug_level must be between 0 and {MAX_DEBUG_LEVEL}, got {debug_level}"
        ))
        .into());
    }

    let package_dir = opts
        .package_dir
        .clone()
        .or_else(|| config.uploader.package_dir.clone())
        .map(|dir| absolute(&dir))
        .transpose()?;

    let mut request = UploadRequest::new(project_dir, core_dir);
    request.environment = cli
        .environment
        .clone()
        .or_else(|| config.project.environment.clone());
    request.board_file = opts.board_file.clone();
    request.upload_protocol = opts.upload_protocol.clone();
    request.package = config
        .uploader
        .package
        .clone()
        .unwrap_or_else(|| DEFAULT_PACKAGE.to_string());
    request.package_dir = package_dir;
    request.debug_level = debug_level;
    Ok(request)
}

/// The uploader runs inside the project directory, so relative core and
/// package paths are resolved up front.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Upload custom firmware command implementation.
pub(crate) fn cmd_upload(cli: &Cli, config: &Config, opts: &UploadOptions) -> Result<()> {
    let request = build_request(cli, config, opts)?;

    if !cli.quiet {
        eprintln!("{} Uploading firmware...", style("⏳").yellow());
    }

    let upload = prepare(&request)?;

    if !cli.quiet {
        eprintln!(
            "    {} environment {}, board {}, protocol {}",
            style("•").dim(),
            style(&upload.environment).cyan(),
            style(&upload.board).cyan(),
            style(&upload.protocol).cyan()
        );
        eprintln!(
            "    {} {} @ {}",
            style("•").dim(),
            upload.settings.firmware,
            upload.settings.offset_address
        );
        if upload.settings.package_dir.is_none() {
            eprintln!(
                "    {} {} not installed, using {} from PATH",
                style("•").dim(),
                style(&request.package).yellow(),
                style(upload.command.program()).yellow()
            );
        }
    }

    // The command itself goes to stdout
    println!("{}", upload.command);

    if opts.dry_run {
        if !cli.quiet {
            eprintln!("{} Dry run, uploader not started", style("ℹ").blue());
        }
        return Ok(());
    }

    upload
        .command
        .execute(&mut ProcessRunner::in_dir(&request.project_dir))?;

    if !cli.quiet {
        eprintln!("\n{} Upload completed", style("✓").green().bold());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["ocdflash"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_request_defaults() {
        let cli = cli(&["--core-dir", "/pio", "upload-custom-firmware"]);
        let request = build_request(&cli, &Config::default(), &UploadOptions::default()).unwrap();
        assert_eq!(request.project_dir, PathBuf::from("."));
        assert_eq!(request.core_dir, PathBuf::from("/pio"));
        assert_eq!(request.package, "tool-openocd");
        assert_eq!(request.debug_level, 1);
        assert!(request.environment.is_none());
        assert!(request.package_dir.is_none());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = cli(&["--core-dir", "/pio", "-e", "release", "upload-custom-firmware"]);
        let mut config = Config::default();
        config.project.environment = Some("debug".to_string());
        config.project.core_dir = Some(PathBuf::from("/elsewhere"));
        config.uploader.debug_level = Some(2);
        let opts = UploadOptions {
            debug_level: Some(3),
            ..UploadOptions::default()
        };

        let request = build_request(&cli, &config, &opts).unwrap();
        assert_eq!(request.environment.as_deref(), Some("release"));
        assert_eq!(request.core_dir, PathBuf::from("/pio"));
        assert_eq!(request.debug_level, 3);
    }

    #[test]
    fn test_config_fills_gaps() {
        let cli = cli(&["upload-custom-firmware"]);
        let mut config = Config::default();
        config.project.core_dir = Some(PathBuf::from("/from-config"));
        config.uploader.package = Some("tool-openocd-alt".to_string());
        config.uploader.debug_level = Some(0);

        let request = build_request(&cli, &config, &UploadOptions::default()).unwrap();
        if std::env::var_os("PLATFORMIO_CORE_DIR").is_none() {
            assert_eq!(request.core_dir, PathBuf::from("/from-config"));
        }
        assert_eq!(request.package, "tool-openocd-alt");
        assert_eq!(request.debug_level, 0);
    }

    #[test]
    fn test_config_debug_level_out_of_range() {
        let cli = cli(&["--core-dir", "/pio", "upload-custom-firmware"]);
        let mut config = Config::default();
        config.uploader.debug_level = Some(9);
        let err = build_request(&cli, &config, &UploadOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Config(_))
        ));
    }

    #[test]
    fn test_relative_core_dir_made_absolute() {
        let cli = cli(&["--core-dir", "pio-core", "upload-custom-firmware"]);
        let request = build_request(&cli, &Config::default(), &UploadOptions::default()).unwrap();
        assert!(request.core_dir.is_absolute());
        assert_eq!(
            request.core_dir,
            std::env::current_dir().unwrap().join("pio-core")
        );
    }

    #[test]
    fn test_relative_package_dir_made_absolute() {
        let cli = cli(&["--core-dir", "/pio", "upload-custom-firmware"]);
        let opts = UploadOptions {
            package_dir: Some(PathBuf::from("tools/openocd")),
            ..UploadOptions::default()
        };
        let request = build_request(&cli, &Config::default(), &opts).unwrap();
        let dir = request.package_dir.unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("tools/openocd"));
    }
}
