//! # ocdflash
//!
//! A library for uploading custom firmware binaries to STM32 boards through
//! OpenOCD, driven by PlatformIO project and board configuration.
//!
//! This crate provides:
//!
//! - a reader for `platformio.ini` with `[env]` inheritance
//! - board manifest lookup (`debug.tools`, `upload.offset_address`)
//! - `tool-openocd` package resolution
//! - OpenOCD command assembly with `$PACKAGE_DIR` substitution
//! - process execution that reports uploader failures as errors
//!
//! ## Features
//!
//! - `serde`: Serialization support for [`Target`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use ocdflash::{ProcessRunner, UploadRequest, prepare};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = UploadRequest::new(".", "/home/user/.platformio");
//!     let upload = prepare(&request)?;
//!
//!     println!("{}", upload.command);
//!     upload.command.execute(&mut ProcessRunner::in_dir("."))?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod board;
pub mod error;
pub mod package;
pub mod project;
pub mod target;
pub mod upload;
pub mod uploader;

// Re-exports for convenience
pub use {
    board::{BoardConfig, DEFAULT_OFFSET_ADDRESS},
    error::{Error, Result},
    package::{DEFAULT_PACKAGE, PackageLocator, default_core_dir},
    project::{PROJECT_FILE, ProjectConfig, ProjectEnv},
    target::{TARGETS, Target, UPLOAD_CUSTOM_FIRMWARE},
    upload::{PreparedUpload, UploadRequest, prepare},
    uploader::{
        DEFAULT_DEBUG_LEVEL, MAX_DEBUG_LEVEL, PACKAGE_DIR_TOKEN, ProcessRunner, Runner,
        UploadCommand, UploadSettings, substitute_package_dir,
    },
};
