//! Error types for ocdflash.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type for ocdflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ocdflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, process spawning).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed `platformio.ini`.
    #[error("Invalid project file {}:{line}: {message}", .path.display())]
    ProjectParse {
        /// Path of the project file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// A required project option is not set.
    #[error("Option `{option}` is not set in environment `{env}`")]
    MissingOption {
        /// Environment name.
        env: String,
        /// Option name.
        option: String,
    },

    /// The requested environment has no `[env:NAME]` section.
    #[error("Unknown environment `{0}`")]
    UnknownEnvironment(String),

    /// The project declares no environment at all.
    #[error("No `[env:NAME]` section found in project file")]
    NoEnvironment,

    /// Malformed board manifest.
    #[error("Invalid board manifest {}: {source}", .path.display())]
    BoardParse {
        /// Path of the manifest.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// No board manifest found in any search location.
    #[error("Board `{board}` not found (searched: {})", format_paths(.searched))]
    BoardNotFound {
        /// Board identifier.
        board: String,
        /// Locations that were tried.
        searched: Vec<PathBuf>,
    },

    /// The upload protocol has no entry in the board's `debug.tools`.
    #[error("Upload protocol `{protocol}` has no debug tool entry (available: {})", .available.join(", "))]
    UnknownProtocol {
        /// Requested protocol.
        protocol: String,
        /// Protocols the board does declare.
        available: Vec<String>,
    },

    /// The debug tool entry has no `server` section.
    #[error("Debug tool `{protocol}` has no `server` section")]
    MissingServer {
        /// Protocol whose entry is incomplete.
        protocol: String,
    },

    /// `server.arguments` is present but is not a list of strings.
    #[error("Debug tool `{protocol}` has invalid `server.arguments`")]
    InvalidServerArguments {
        /// Protocol whose entry is invalid.
        protocol: String,
    },

    /// Neither the project nor the board names an upload protocol.
    #[error("No upload protocol configured")]
    NoUploadProtocol,

    /// The uploader executable could not be started.
    #[error("Uploader not found: {}", .path.display())]
    UploaderNotFound {
        /// Executable that was tried.
        path: PathBuf,
    },

    /// The uploader ran and reported failure.
    #[error("Uploader failed: {status}")]
    UploaderFailed {
        /// Exit status of the child process.
        status: ExitStatus,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Whether the uploader itself failed, as opposed to configuration or
    /// file access problems detected before it was started.
    pub fn is_uploader(&self) -> bool {
        matches!(
            self,
            Self::UploaderNotFound { .. } | Self::UploaderFailed { .. }
        )
    }
}
