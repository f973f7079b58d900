//! OpenOCD upload command assembly and invocation.
//!
//! The command line has a fixed shape:
//!
//! ```text
//! <package dir>/bin/openocd -d1 <server arguments...> -c "program <firmware> <address> verify reset; shutdown;"
//! ```
//!
//! After assembly every `$PACKAGE_DIR` token in every argument is replaced by
//! the package directory, so board-provided arguments such as
//! `-s $PACKAGE_DIR/openocd/scripts` point into the installed package.

use crate::error::{Error, Result};
use crate::package::dir_to_string;
use log::{debug, info};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Placeholder substituted with the package directory.
pub const PACKAGE_DIR_TOKEN: &str = "$PACKAGE_DIR";

/// OpenOCD debug level used unless configured otherwise (`-d1`).
pub const DEFAULT_DEBUG_LEVEL: u8 = 1;

/// Highest debug level OpenOCD accepts.
pub const MAX_DEBUG_LEVEL: u8 = 4;

/// Executable path relative to the package directory.
const EXECUTABLE: &str = "bin/openocd";

/// Executable looked up on `PATH` when the package is not installed.
const FALLBACK_EXECUTABLE: &str = "openocd";

/// Inputs of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Installed OpenOCD package directory, if any.
    pub package_dir: Option<PathBuf>,
    /// OpenOCD debug level (`-d<level>`).
    pub debug_level: u8,
    /// Debug server arguments from the board's `debug.tools` entry.
    pub server_arguments: Vec<String>,
    /// Firmware file, relative to the project directory.
    pub firmware: String,
    /// Flash address, passed to OpenOCD verbatim.
    pub offset_address: String,
}

/// Firmware path as given to OpenOCD: relative paths are prefixed with `./`.
pub fn firmware_path(firmware: &str) -> String {
    Path::new(".").join(firmware).to_string_lossy().into_owned()
}

/// The OpenOCD `program` command string.
pub fn program_command(firmware_path: &str, address: &str) -> String {
    format!("program {firmware_path} {address} verify reset; shutdown;")
}

/// Replace every `$PACKAGE_DIR` token in every argument.
pub fn substitute_package_dir(args: Vec<String>, package_dir: &str) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            if arg.contains(PACKAGE_DIR_TOKEN) {
                arg.replace(PACKAGE_DIR_TOKEN, package_dir)
            } else {
                arg
            }
        })
        .collect()
}

/// A fully assembled uploader command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCommand {
    args: Vec<String>,
}

impl UploadCommand {
    /// Assemble the command line for `settings`.
    pub fn assemble(settings: &UploadSettings) -> Self {
        let package_dir = dir_to_string(settings.package_dir.as_deref());
        let executable = match &settings.package_dir {
            Some(_) => format!("{package_dir}/{EXECUTABLE}"),
            None => FALLBACK_EXECUTABLE.to_string(),
        };

        let mut args = Vec::with_capacity(settings.server_arguments.len() + 4);
        args.push(executable);
        args.push(format!("-d{}", settings.debug_level));
        args.extend(settings.server_arguments.iter().cloned());
        args.push("-c".to_string());
        args.push(program_command(
            &firmware_path(&settings.firmware),
            &settings.offset_address,
        ));

        let args = substitute_package_dir(args, &package_dir);
        debug!("Assembled uploader command: {args:?}");
        Self { args }
    }

    /// The whole command line, executable first.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The executable.
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// Arguments after the executable.
    pub fn arguments(&self) -> &[String] {
        &self.args[1..]
    }

    /// Run the command and turn a failed start or non-zero exit into an error.
    pub fn execute<R: Runner + ?Sized>(&self, runner: &mut R) -> Result<()> {
        info!("Running {}", self.program());
        match runner.run(self) {
            Ok(status) if status.success() => {
                debug!("Uploader finished: {status}");
                Ok(())
            },
            Ok(status) => Err(Error::UploaderFailed { status }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::UploaderNotFound {
                path: PathBuf::from(self.program()),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl fmt::Display for UploadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.args)
    }
}

/// Runs an assembled command to completion.
pub trait Runner {
    /// Run `command` and wait for it to exit.
    fn run(&mut self, command: &UploadCommand) -> io::Result<ExitStatus>;
}

/// Runs the command as a child process with inherited standard streams.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Runner that starts the child in `dir`, so `./<firmware>` resolves
    /// against the project.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

impl Runner for ProcessRunner {
    fn run(&mut self, command: &UploadCommand) -> io::Result<ExitStatus> {
        let mut child = Command::new(command.program());
        child.args(command.arguments());
        if let Some(dir) = &self.working_dir {
            child.current_dir(dir);
        }
        child.status()
    }
}
