//! Resolve project, board and package configuration into an upload command.

use crate::board::BoardConfig;
use crate::error::{Error, Result};
use crate::package::{DEFAULT_PACKAGE, PackageLocator};
use crate::project::ProjectConfig;
use crate::uploader::{DEFAULT_DEBUG_LEVEL, UploadCommand, UploadSettings};
use log::{debug, info, warn};
use std::path::PathBuf;

/// What to upload and where the configuration lives.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Directory containing `platformio.ini`.
    pub project_dir: PathBuf,
    /// Environment name; the project's default environment when `None`.
    pub environment: Option<String>,
    /// PlatformIO core directory (platforms and packages).
    pub core_dir: PathBuf,
    /// Board manifest to use instead of searching for one.
    pub board_file: Option<PathBuf>,
    /// Upload protocol overriding project and board settings.
    pub upload_protocol: Option<String>,
    /// Uploader package name.
    pub package: String,
    /// Uploader package directory overriding the core directory lookup.
    pub package_dir: Option<PathBuf>,
    /// OpenOCD debug level.
    pub debug_level: u8,
}

impl UploadRequest {
    /// Request with default package and debug level.
    pub fn new(project_dir: impl Into<PathBuf>, core_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            environment: None,
            core_dir: core_dir.into(),
            board_file: None,
            upload_protocol: None,
            package: DEFAULT_PACKAGE.to_string(),
            package_dir: None,
            debug_level: DEFAULT_DEBUG_LEVEL,
        }
    }
}

/// A resolved upload, ready to print and execute.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    /// Selected environment.
    pub environment: String,
    /// Board identifier from the project.
    pub board: String,
    /// Board manifest that was read.
    pub board_file: PathBuf,
    /// Upload protocol in effect.
    pub protocol: String,
    /// Inputs the command was assembled from.
    pub settings: UploadSettings,
    /// The assembled command.
    pub command: UploadCommand,
}

/// Read all configuration for `request` and assemble the uploader command.
///
/// Never starts a process: every configuration error surfaces here, before
/// anything is executed.
pub fn prepare(request: &UploadRequest) -> Result<PreparedUpload> {
    let project = ProjectConfig::load(&request.project_dir)?;
    let env = project.env(request.environment.as_deref())?;
    debug!("Using environment {}", env.name());

    let firmware = env.custom_firmware()?.to_string();
    let board_name = env.board()?.to_string();

    let board_file = match &request.board_file {
        Some(path) => path.clone(),
        None => BoardConfig::locate(
            &request.project_dir,
            &request.core_dir,
            env.platform(),
            &board_name,
        )?,
    };
    let mut board = BoardConfig::load(&board_file)?;
    for (key, value) in env.board_overrides() {
        debug!("Board override {key} = {value}");
        board.apply_override(&key, &value);
    }

    let protocol = request
        .upload_protocol
        .as_deref()
        .or_else(|| env.upload_protocol())
        .or_else(|| board.default_upload_protocol())
        .ok_or(Error::NoUploadProtocol)?
        .to_string();
    let server_arguments = board.server_arguments(&protocol)?;

    if !request.project_dir.join(&firmware).is_file() {
        warn!(
            "Firmware {} not found in {}",
            firmware,
            request.project_dir.display()
        );
    }

    let package_dir = PackageLocator::new(&request.core_dir)
        .with_package(request.package.as_str())
        .with_explicit_dir(request.package_dir.clone())
        .package_dir();

    let settings = UploadSettings {
        package_dir,
        debug_level: request.debug_level,
        server_arguments,
        firmware,
        offset_address: board.offset_address().to_string(),
    };
    let command = UploadCommand::assemble(&settings);
    info!(
        "Prepared upload for {} ({}) via {}",
        env.name(),
        board.name().unwrap_or(&board_name),
        protocol
    );

    Ok(PreparedUpload {
        environment: env.name().to_string(),
        board: board_name,
        board_file,
        protocol,
        settings,
        command,
    })
}
